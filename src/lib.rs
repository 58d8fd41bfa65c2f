pub mod core;
pub mod config;
pub mod tools;

// Model backend
pub mod llm;

// Terminal front end
pub mod cli;
pub mod logging;

// Agent turn loop
pub mod agent;

// MCP (Model Context Protocol) tool servers
pub mod mcp;

// Startup, chat, teardown
pub mod app;
