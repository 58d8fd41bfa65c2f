//! Output produced by the agent during a turn

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::ToolResult;

/// Output chunks emitted by the agent while it processes a turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputChunk {
    /// Complete text block from the model
    TextComplete(String),

    /// Tool execution starting
    ToolStart {
        /// Tool use ID
        id: String,
        /// Tool name
        name: String,
        /// Tool input
        input: Value,
    },

    /// Tool execution completed
    ToolEnd {
        /// Tool use ID
        id: String,
        /// Tool name
        name: String,
        /// Tool result
        result: ToolResult,
    },

    /// Status update (iteration cap reached, truncated response, ...)
    Status(String),
}

/// Receiver of agent output
///
/// The console implements this for the interactive loop; tests collect chunks.
pub trait OutputSink: Send + Sync {
    /// Deliver one output chunk
    fn emit(&self, chunk: OutputChunk);
}
