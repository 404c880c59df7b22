use serde::{Deserialize, Serialize};

/// Client→server frames on a terminal connection. Terminal bytes travel
/// base64-encoded inside JSON text frames.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Input { data: String },
    Resize { cols: u16, rows: u16 },
    Restart,
    Ping,
}

/// Server→client frames on a terminal connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    #[serde(rename_all = "camelCase")]
    Connected {
        session_id: String,
        tab_id: Option<String>,
        branch_name: String,
        base_branch: String,
        base_commit: String,
        is_new_session: bool,
        reconnected: bool,
    },
    Output { data: String },
    Exit { code: i32 },
    Pong,
    Error { message: String },
}
