use crate::shared::ids::{ChatId, MessageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    User,
    System,
    FileUpload,
    Progress,
    Error,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::User => "user",
            MessageType::System => "system",
            MessageType::FileUpload => "file_upload",
            MessageType::Progress => "progress",
            MessageType::Error => "error",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(MessageType::User),
            "system" => Some(MessageType::System),
            "file_upload" => Some(MessageType::FileUpload),
            "progress" => Some(MessageType::Progress),
            "error" => Some(MessageType::Error),
            _ => None,
        }
    }
}

/// An immutable entry in a conversation's transcript.
///
/// Grounded in the teacher's message-record types under the channel/memory
/// layers: plain data, validated at construction, never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: MessageId,
    pub chat_id: ChatId,
    pub message_type: MessageType,
    pub content: String,
    pub metadata: BTreeMap<String, JsonValue>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        chat_id: ChatId,
        message_type: MessageType,
        content: String,
        metadata: BTreeMap<String, JsonValue>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            message_id: MessageId::new_random(),
            chat_id,
            message_type,
            content,
            metadata,
            created_at,
        }
    }

    /// Marks a system message's metadata as carrying a workflow proposal
    /// that the user must confirm or decline before it can run.
    pub fn with_pending_workflow(mut self, proposal: JsonValue) -> Self {
        self.metadata
            .insert("pending_workflow".to_string(), proposal);
        self.metadata
            .insert("requires_confirmation".to_string(), JsonValue::Bool(true));
        self
    }

    pub fn requires_confirmation(&self) -> bool {
        self.metadata
            .get("requires_confirmation")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}
