use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Typed event stream handed to clients. The external agent process emits
/// loosely-typed JSON records; they are converted into this closed set at
/// the transcoder boundary so nothing downstream branches on untyped fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Incremental text: only characters not previously delivered.
    Text { content: String },
    /// Opaque reasoning block, display-only.
    Thinking { content: String },
    ToolUse {
        id: String,
        tool: String,
        input: Value,
    },
    ToolResult {
        id: String,
        tool: String,
        output: String,
        success: bool,
    },
    Error { message: String },
    /// Terminal event of a turn; carries the full accumulated message.
    Done { content: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One prior exchange entry fed back to the agent for context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}
