use crate::domain::{FileEntry, Message, WorkflowStep};
use crate::shared::ids::ChatId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Created,
    Processing,
    Completed,
    Failed,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Created => "created",
            ConversationStatus::Processing => "processing",
            ConversationStatus::Completed => "completed",
            ConversationStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "created" => Some(ConversationStatus::Created),
            "processing" => Some(ConversationStatus::Processing),
            "completed" => Some(ConversationStatus::Completed),
            "failed" => Some(ConversationStatus::Failed),
            _ => None,
        }
    }

    /// `created -> processing -> {completed, failed}`, monotone except a
    /// terminal conversation may be reset to `created` by restore (§3).
    fn can_transition_to(self, next: ConversationStatus) -> bool {
        use ConversationStatus::*;
        matches!(
            (self, next),
            (Created, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Completed, Created)
                | (Failed, Created)
        )
    }
}

#[derive(Debug, thiserror::Error)]
#[error("illegal conversation status transition from {from:?} to {to:?}")]
pub struct ConversationTransitionError {
    pub from: ConversationStatus,
    pub to: ConversationStatus,
}

/// The top-level aggregate: a conversation and everything it owns
/// (messages, workflow steps, file entries). Cascade-owned; deleting the
/// conversation deletes all of these (spec §3 "Ownership").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub chat_id: ChatId,
    pub participant_name: String,
    pub status: ConversationStatus,
    pub partition_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    pub workflow_steps: Vec<WorkflowStep>,
    pub uploaded_files: Vec<String>,
    pub output_files: Vec<String>,
    pub metadata: BTreeMap<String, JsonValue>,
}

impl Conversation {
    pub fn new(
        chat_id: ChatId,
        participant_name: String,
        partition_key: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            chat_id,
            participant_name,
            status: ConversationStatus::Created,
            partition_key,
            created_at,
            updated_at: created_at,
            messages: Vec::new(),
            workflow_steps: Vec::new(),
            uploaded_files: Vec::new(),
            output_files: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn set_status(
        &mut self,
        next: ConversationStatus,
        now: DateTime<Utc>,
    ) -> Result<(), ConversationTransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(ConversationTransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Idempotent union: adding a path already present is a no-op. Backs
    /// the §9 "context is a cache over the repository" rule.
    pub fn record_uploaded_file(&mut self, path: String) {
        if !self.uploaded_files.contains(&path) {
            self.uploaded_files.push(path);
        }
    }

    pub fn record_output_file(&mut self, path: String) {
        if !self.output_files.contains(&path) {
            self.output_files.push(path);
        }
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn push_workflow_step(&mut self, step: WorkflowStep) {
        self.workflow_steps.push(step);
    }

    pub fn sort_children(&mut self) {
        self.messages.sort_by_key(|m| m.created_at);
        self.workflow_steps.sort_by_key(|s| s.started_at);
    }

    pub fn apply_file_entries(&mut self, entries: &[FileEntry]) {
        for entry in entries {
            match entry.role {
                crate::domain::FileRole::Uploaded => {
                    self.record_uploaded_file(entry.file_path.clone())
                }
                crate::domain::FileRole::Output => self.record_output_file(entry.file_path.clone()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Conversation {
        Conversation::new(
            ChatId::new_random(),
            "BlueWhale-4821".to_string(),
            "2026/02".to_string(),
            Utc::now(),
        )
    }

    #[test]
    fn status_progresses_monotonically() {
        let mut convo = sample();
        let now = Utc::now();
        convo
            .set_status(ConversationStatus::Processing, now)
            .expect("created -> processing");
        convo
            .set_status(ConversationStatus::Completed, now)
            .expect("processing -> completed");
        let err = convo
            .set_status(ConversationStatus::Processing, now)
            .expect_err("completed cannot go back to processing");
        assert_eq!(err.from, ConversationStatus::Completed);
    }

    #[test]
    fn terminal_status_may_be_reentered_as_created_via_restore() {
        let mut convo = sample();
        let now = Utc::now();
        convo.set_status(ConversationStatus::Processing, now).unwrap();
        convo.set_status(ConversationStatus::Failed, now).unwrap();
        convo
            .set_status(ConversationStatus::Created, now)
            .expect("restore resets to created");
    }

    #[test]
    fn recording_same_upload_path_twice_is_idempotent() {
        let mut convo = sample();
        convo.record_uploaded_file("data.xlsx".to_string());
        convo.record_uploaded_file("data.xlsx".to_string());
        assert_eq!(convo.uploaded_files.len(), 1);
    }
}
