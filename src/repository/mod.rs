pub mod error;

pub use error::RepositoryError;

use chrono::{DateTime, Utc};

use crate::config::PartitionStrategy;
use crate::domain::{Conversation, ConversationStatus, FileEntry, FileRole, Message, MessageType, WorkflowStep};
use crate::persistence::PersistenceStore;
use crate::shared::ids::{generate_participant_name, ChatId};
use crate::storage::{compute_partition_key, ConversationMetadata, Storage};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Composes Persistence + Storage into coherent conversation-level
/// operations; the only component that mutates both together (spec
/// §4.4).
pub struct Repository {
    persistence: PersistenceStore,
    storage: Storage,
    partition_strategy: PartitionStrategy,
    partition_time_format: String,
}

impl Repository {
    pub fn new(
        persistence: PersistenceStore,
        storage: Storage,
        partition_strategy: PartitionStrategy,
        partition_time_format: String,
    ) -> Self {
        Self {
            persistence,
            storage,
            partition_strategy,
            partition_time_format,
        }
    }

    pub fn create_conversation(&self) -> Result<Conversation, RepositoryError> {
        let chat_id = ChatId::new_random();
        let participant_name = generate_participant_name();
        let now = crate::shared::time::now();
        let partition_key = compute_partition_key(
            self.partition_strategy,
            &self.partition_time_format,
            &chat_id,
            now,
        );

        let metadata = ConversationMetadata {
            chat_id: chat_id.clone(),
            partition_key: partition_key.clone(),
            created_at: now,
            participant_name: participant_name.clone(),
            status: ConversationStatus::Created.as_str().to_string(),
        };

        self.persistence.upsert_conversation(
            &chat_id,
            &participant_name,
            ConversationStatus::Created,
            &partition_key,
            now,
            now,
            &BTreeMap::new(),
        )?;
        self.storage
            .create_conversation_skeleton(&partition_key, &chat_id, &metadata)?;

        Ok(Conversation::new(chat_id, participant_name, partition_key, now))
    }

    pub fn get_conversation(&self, chat_id: &ChatId) -> Result<Option<Conversation>, RepositoryError> {
        let Some(row) = self.persistence.get_conversation_row(chat_id)? else {
            return Ok(None);
        };
        let mut conversation = Conversation {
            chat_id: row.chat_id,
            participant_name: row.participant_name,
            status: row.status,
            partition_key: row.partition_key,
            created_at: row.created_at,
            updated_at: row.updated_at,
            messages: Vec::new(),
            workflow_steps: Vec::new(),
            uploaded_files: Vec::new(),
            output_files: Vec::new(),
            metadata: row.metadata,
        };
        conversation.messages = self.persistence.list_messages(chat_id)?;
        conversation.workflow_steps = self.persistence.list_workflow_steps(chat_id)?;
        let files = self.persistence.list_file_entries(chat_id)?;
        conversation.apply_file_entries(&files);
        conversation.sort_children();
        Ok(Some(conversation))
    }

    pub fn list_conversations(
        &self,
        status: Option<ConversationStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let rows = self.persistence.list_conversations(status, limit, offset)?;
        Ok(rows
            .into_iter()
            .map(|row| Conversation {
                chat_id: row.chat_id,
                participant_name: row.participant_name,
                status: row.status,
                partition_key: row.partition_key,
                created_at: row.created_at,
                updated_at: row.updated_at,
                messages: Vec::new(),
                workflow_steps: Vec::new(),
                uploaded_files: Vec::new(),
                output_files: Vec::new(),
                metadata: row.metadata,
            })
            .collect())
    }

    pub fn add_message(
        &self,
        chat_id: &ChatId,
        message_type: MessageType,
        content: String,
        metadata: BTreeMap<String, JsonValue>,
    ) -> Result<Message, RepositoryError> {
        let message = Message::new(chat_id.clone(), message_type, content, metadata, crate::shared::time::now());
        self.persistence.insert_message(&message)?;
        Ok(message)
    }

    pub fn add_workflow_step(
        &self,
        chat_id: &ChatId,
        operation: String,
        arguments: BTreeMap<String, JsonValue>,
    ) -> Result<WorkflowStep, RepositoryError> {
        let step = WorkflowStep::new_pending(chat_id.clone(), operation, arguments);
        self.persistence.upsert_workflow_step(&step)?;
        Ok(step)
    }

    pub fn update_workflow_step(&self, step: &WorkflowStep) -> Result<(), RepositoryError> {
        self.persistence.upsert_workflow_step(step)?;
        Ok(())
    }

    pub fn record_file(
        &self,
        chat_id: &ChatId,
        file_path: String,
        role: FileRole,
    ) -> Result<FileEntry, RepositoryError> {
        let entry = FileEntry::new(chat_id.clone(), file_path, role, crate::shared::time::now());
        self.persistence.upsert_file_entry(&entry)?;
        Ok(entry)
    }

    /// Persists a conversation status change in isolation, preserving
    /// every other stored field (used by the Workflow Executor's
    /// `on_complete` callback to flip `processing -> {completed, failed}`
    /// without re-deriving the whole row).
    pub fn set_status(
        &self,
        chat_id: &ChatId,
        status: ConversationStatus,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let row = self
            .persistence
            .get_conversation_row(chat_id)?
            .ok_or(RepositoryError::ConversationNotFound)?;
        self.persistence.upsert_conversation(
            chat_id,
            &row.participant_name,
            status,
            &row.partition_key,
            row.created_at,
            now,
            &row.metadata,
        )?;
        Ok(())
    }

    pub fn delete_conversation(&self, chat_id: &ChatId) -> Result<(), RepositoryError> {
        let Some(conversation) = self.get_conversation(chat_id)? else {
            return Err(RepositoryError::ConversationNotFound);
        };
        self.persistence.delete_conversation(chat_id)?;
        self.storage
            .delete_conversation(&conversation.partition_key, chat_id)?;
        Ok(())
    }

    pub fn dump(&self, chat_id: &ChatId) -> Result<PathBuf, RepositoryError> {
        let conversation = self
            .get_conversation(chat_id)?
            .ok_or(RepositoryError::ConversationNotFound)?;
        let files = self.persistence.list_file_entries(chat_id)?;

        self.storage.write_export_file(
            &conversation.partition_key,
            chat_id,
            "messages.json",
            &serde_json::to_vec(&conversation.messages)?,
        )?;
        self.storage.write_export_file(
            &conversation.partition_key,
            chat_id,
            "workflow_steps.json",
            &serde_json::to_vec(&conversation.workflow_steps)?,
        )?;
        self.storage.write_export_file(
            &conversation.partition_key,
            chat_id,
            "files.json",
            &serde_json::to_vec(&files)?,
        )?;

        Ok(self.storage.dump(&conversation.partition_key, chat_id)?)
    }

    pub fn restore(&self, archive_bytes: &[u8]) -> Result<Conversation, RepositoryError> {
        let outcome = self.storage.restore(archive_bytes)?;
        let metadata = outcome.metadata;

        let messages: Vec<Message> = self
            .storage
            .read_export_file(&outcome.conversation_dir, "messages.json")?
            .map(|bytes| serde_json::from_slice(&bytes))
            .transpose()?
            .unwrap_or_default();
        let steps: Vec<WorkflowStep> = self
            .storage
            .read_export_file(&outcome.conversation_dir, "workflow_steps.json")?
            .map(|bytes| serde_json::from_slice(&bytes))
            .transpose()?
            .unwrap_or_default();
        let files: Vec<FileEntry> = self
            .storage
            .read_export_file(&outcome.conversation_dir, "files.json")?
            .map(|bytes| serde_json::from_slice(&bytes))
            .transpose()?
            .unwrap_or_default();

        let now = crate::shared::time::now();
        self.persistence.upsert_conversation(
            &metadata.chat_id,
            &metadata.participant_name,
            ConversationStatus::Created,
            &metadata.partition_key,
            metadata.created_at,
            now,
            &BTreeMap::new(),
        )?;
        for message in &messages {
            self.persistence.insert_message(message)?;
        }
        for step in &steps {
            self.persistence.upsert_workflow_step(step)?;
        }
        for entry in &files {
            self.persistence.upsert_file_entry(entry)?;
        }

        self.get_conversation(&metadata.chat_id)?
            .ok_or(RepositoryError::ConversationNotFound)
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn snapshot_persistence(&self, snapshots_dir: &std::path::Path) -> Result<PathBuf, RepositoryError> {
        Ok(self.persistence.snapshot(snapshots_dir)?)
    }
}
