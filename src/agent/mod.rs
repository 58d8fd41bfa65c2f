pub mod config;
pub mod instructions;
pub mod standard_loop;

pub use config::AgentConfig;
pub use instructions::DEFAULT_INSTRUCTIONS;
pub use standard_loop::Agent;
