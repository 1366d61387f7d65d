use crate::shared::ids::ChatId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    Uploaded,
    Output,
}

impl FileRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileRole::Uploaded => "uploaded",
            FileRole::Output => "output",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "uploaded" => Some(FileRole::Uploaded),
            "output" => Some(FileRole::Output),
            _ => None,
        }
    }
}

/// Record of a single file tied to a conversation. `(chat_id, file_path,
/// role)` is unique; repeated saves of the same path are idempotent
/// updates (spec §3 FileEntry, §8 uniqueness invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub chat_id: ChatId,
    pub file_path: String,
    pub role: FileRole,
    pub created_at: DateTime<Utc>,
}

impl FileEntry {
    pub fn new(chat_id: ChatId, file_path: String, role: FileRole, created_at: DateTime<Utc>) -> Self {
        Self {
            chat_id,
            file_path,
            role,
            created_at,
        }
    }
}
