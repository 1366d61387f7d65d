use serde::{Deserialize, Serialize};

/// Server-to-client event envelope (spec §6 "WebSocket surface").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected {
        chat_id: String,
        timestamp: String,
    },
    WorkflowStarted {
        chat_id: String,
        total_steps: u32,
        message: String,
    },
    Progress {
        chat_id: String,
        step_id: String,
        operation: String,
        progress: u8,
        status: String,
        message: String,
    },
    StepCompleted {
        chat_id: String,
        step_id: String,
        operation: String,
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        output_file: Option<String>,
    },
    WorkflowCompleted {
        chat_id: String,
        total_steps: u32,
        output_files_count: u32,
        message: String,
    },
    WorkflowFailed {
        chat_id: String,
        error: String,
        message: String,
    },
    Pong {
        timestamp: String,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    pub fn chat_id(&self) -> Option<&str> {
        match self {
            ServerEvent::Connected { chat_id, .. }
            | ServerEvent::WorkflowStarted { chat_id, .. }
            | ServerEvent::Progress { chat_id, .. }
            | ServerEvent::StepCompleted { chat_id, .. }
            | ServerEvent::WorkflowCompleted { chat_id, .. }
            | ServerEvent::WorkflowFailed { chat_id, .. } => Some(chat_id),
            ServerEvent::Pong { .. } | ServerEvent::Error { .. } => None,
        }
    }
}

/// Client-to-server frames (spec §6): `{"type":"ping"}` and
/// `{"type":"subscribe","chat_id":"…"}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Ping,
    Subscribe { chat_id: String },
}
