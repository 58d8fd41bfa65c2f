//! Core types shared across the agent
//!
//! - `AgentError` - Error types
//! - `OutputChunk` / `OutputSink` - What the agent emits while processing a turn

pub mod error;
pub mod output;

pub use error::{AgentError, AgentResult};
pub use output::{OutputChunk, OutputSink};
