use super::schema::SCHEMA_STATEMENTS;
use super::PersistenceError;
use crate::domain::{
    ConversationStatus, FileEntry, FileRole, Message, MessageType, StepStatus, WorkflowStep,
};
use crate::shared::ids::{ChatId, MessageId, StepId};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Row-level view of a conversation without its hydrated children; the
/// Repository composes this with Messages/WorkflowSteps/FileEntries.
#[derive(Debug, Clone)]
pub struct ConversationRow {
    pub chat_id: ChatId,
    pub participant_name: String,
    pub status: ConversationStatus,
    pub partition_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: BTreeMap<String, JsonValue>,
}

/// Single-file relational store for conversations, messages, workflow
/// steps, and file entries (spec §4.3). Writes are serialized by a
/// per-store mutex around the connection.
pub struct PersistenceStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339()
}

fn parse_rfc3339(raw: &str) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| PersistenceError::Decode(err.to_string()))
}

fn parse_rfc3339_opt(raw: Option<String>) -> Result<Option<DateTime<Utc>>, PersistenceError> {
    raw.map(|value| parse_rfc3339(&value)).transpose()
}

impl PersistenceStore {
    pub fn open(db_path: &Path) -> Result<Self, PersistenceError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        for statement in SCHEMA_STATEMENTS {
            conn.execute_batch(statement)?;
        }
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn upsert_conversation(
        &self,
        chat_id: &ChatId,
        participant_name: &str,
        status: ConversationStatus,
        partition_key: &str,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        metadata: &BTreeMap<String, JsonValue>,
    ) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().expect("persistence mutex poisoned");
        conn.execute(
            "INSERT INTO conversations (chat_id, participant_name, status, partition_key, created_at, updated_at, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(chat_id) DO UPDATE SET
                participant_name = excluded.participant_name,
                status = excluded.status,
                updated_at = excluded.updated_at,
                metadata = excluded.metadata",
            params![
                chat_id.as_str(),
                participant_name,
                status.as_str(),
                partition_key,
                to_rfc3339(created_at),
                to_rfc3339(updated_at),
                serde_json::to_string(metadata).map_err(|e| PersistenceError::Decode(e.to_string()))?,
            ],
        )?;
        Ok(())
    }

    pub fn get_conversation_row(
        &self,
        chat_id: &ChatId,
    ) -> Result<Option<ConversationRow>, PersistenceError> {
        let conn = self.conn.lock().expect("persistence mutex poisoned");
        conn.query_row(
            "SELECT chat_id, participant_name, status, partition_key, created_at, updated_at, metadata
             FROM conversations WHERE chat_id = ?1",
            params![chat_id.as_str()],
            row_to_conversation,
        )
        .optional()
        .map_err(PersistenceError::from)?
        .transpose()
    }

    pub fn list_conversations(
        &self,
        status: Option<ConversationStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ConversationRow>, PersistenceError> {
        let conn = self.conn.lock().expect("persistence mutex poisoned");
        let mut stmt = if status.is_some() {
            conn.prepare(
                "SELECT chat_id, participant_name, status, partition_key, created_at, updated_at, metadata
                 FROM conversations WHERE status = ?1 ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
            )?
        } else {
            conn.prepare(
                "SELECT chat_id, participant_name, status, partition_key, created_at, updated_at, metadata
                 FROM conversations ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
            )?
        };
        let rows = if let Some(status) = status {
            stmt.query_map(params![status.as_str(), limit, offset], row_to_conversation)?
                .collect::<Result<Vec<_>, _>>()?
        } else {
            stmt.query_map(params![limit, offset], row_to_conversation)?
                .collect::<Result<Vec<_>, _>>()?
        };
        rows.into_iter().collect()
    }

    pub fn delete_conversation(&self, chat_id: &ChatId) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().expect("persistence mutex poisoned");
        conn.execute(
            "DELETE FROM conversations WHERE chat_id = ?1",
            params![chat_id.as_str()],
        )?;
        Ok(())
    }

    pub fn insert_message(&self, message: &Message) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().expect("persistence mutex poisoned");
        conn.execute(
            "INSERT INTO messages (message_id, chat_id, message_type, content, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.message_id.as_str(),
                message.chat_id.as_str(),
                message.message_type.as_str(),
                message.content,
                serde_json::to_string(&message.metadata)
                    .map_err(|e| PersistenceError::Decode(e.to_string()))?,
                to_rfc3339(message.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn list_messages(&self, chat_id: &ChatId) -> Result<Vec<Message>, PersistenceError> {
        let conn = self.conn.lock().expect("persistence mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT message_id, chat_id, message_type, content, metadata, created_at
             FROM messages WHERE chat_id = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt
            .query_map(params![chat_id.as_str()], row_to_message)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().collect()
    }

    pub fn upsert_workflow_step(&self, step: &WorkflowStep) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().expect("persistence mutex poisoned");
        conn.execute(
            "INSERT INTO workflow_steps
                (step_id, chat_id, operation, arguments, input_file, output_file, status, progress, error_message, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(step_id) DO UPDATE SET
                input_file = excluded.input_file,
                output_file = excluded.output_file,
                status = excluded.status,
                progress = excluded.progress,
                error_message = excluded.error_message,
                started_at = excluded.started_at,
                completed_at = excluded.completed_at",
            params![
                step.step_id.as_str(),
                step.chat_id.as_str(),
                step.operation,
                serde_json::to_string(&step.arguments)
                    .map_err(|e| PersistenceError::Decode(e.to_string()))?,
                step.input_file,
                step.output_file,
                step.status.as_str(),
                step.progress as i64,
                step.error_message,
                step.started_at.map(to_rfc3339),
                step.completed_at.map(to_rfc3339),
            ],
        )?;
        Ok(())
    }

    pub fn list_workflow_steps(
        &self,
        chat_id: &ChatId,
    ) -> Result<Vec<WorkflowStep>, PersistenceError> {
        let conn = self.conn.lock().expect("persistence mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT step_id, chat_id, operation, arguments, input_file, output_file, status, progress, error_message, started_at, completed_at
             FROM workflow_steps WHERE chat_id = ?1 ORDER BY started_at ASC",
        )?;
        let rows = stmt
            .query_map(params![chat_id.as_str()], row_to_workflow_step)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().collect()
    }

    pub fn upsert_file_entry(&self, entry: &FileEntry) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().expect("persistence mutex poisoned");
        conn.execute(
            "INSERT INTO files (chat_id, file_path, role, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(chat_id, file_path, role) DO UPDATE SET created_at = excluded.created_at",
            params![
                entry.chat_id.as_str(),
                entry.file_path,
                entry.role.as_str(),
                to_rfc3339(entry.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn list_file_entries(&self, chat_id: &ChatId) -> Result<Vec<FileEntry>, PersistenceError> {
        let conn = self.conn.lock().expect("persistence mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT chat_id, file_path, role, created_at FROM files WHERE chat_id = ?1 ORDER BY role, file_path",
        )?;
        let rows = stmt
            .query_map(params![chat_id.as_str()], row_to_file_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().collect()
    }

    /// Copies the store file atomically into `snapshots_dir` with a
    /// timestamped name, holding the write mutex for the duration of the
    /// copy (spec §4.3 "snapshot").
    pub fn snapshot(&self, snapshots_dir: &Path) -> Result<PathBuf, PersistenceError> {
        let conn = self.conn.lock().expect("persistence mutex poisoned");
        std::fs::create_dir_all(snapshots_dir)?;
        let timestamp = Utc::now().format("%Y%m%d%H%M%S%3f");
        let dest = snapshots_dir.join(format!("chat_backup_{timestamp}.db"));
        conn.execute("PRAGMA wal_checkpoint(FULL)", [])?;
        std::fs::copy(&self.db_path, &dest)?;
        Ok(dest)
    }
}

fn row_to_conversation(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<Result<ConversationRow, PersistenceError>> {
    Ok((|| {
        let chat_id_raw: String = row.get(0)?;
        let participant_name: String = row.get(1)?;
        let status_raw: String = row.get(2)?;
        let partition_key: String = row.get(3)?;
        let created_at_raw: String = row.get(4)?;
        let updated_at_raw: String = row.get(5)?;
        let metadata_raw: String = row.get(6)?;

        Ok(ConversationRow {
            chat_id: ChatId::parse(&chat_id_raw)
                .map_err(PersistenceError::Decode)?,
            participant_name,
            status: ConversationStatus::parse(&status_raw)
                .ok_or_else(|| PersistenceError::Decode(format!("bad status `{status_raw}`")))?,
            partition_key,
            created_at: parse_rfc3339(&created_at_raw)?,
            updated_at: parse_rfc3339(&updated_at_raw)?,
            metadata: serde_json::from_str(&metadata_raw)
                .map_err(|e| PersistenceError::Decode(e.to_string()))?,
        })
    })())
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Message, PersistenceError>> {
    Ok((|| {
        let message_id_raw: String = row.get(0)?;
        let chat_id_raw: String = row.get(1)?;
        let message_type_raw: String = row.get(2)?;
        let content: String = row.get(3)?;
        let metadata_raw: String = row.get(4)?;
        let created_at_raw: String = row.get(5)?;

        Ok(Message {
            message_id: MessageId::parse(&message_id_raw).map_err(PersistenceError::Decode)?,
            chat_id: ChatId::parse(&chat_id_raw).map_err(PersistenceError::Decode)?,
            message_type: MessageType::parse(&message_type_raw).ok_or_else(|| {
                PersistenceError::Decode(format!("bad message_type `{message_type_raw}`"))
            })?,
            content,
            metadata: serde_json::from_str(&metadata_raw)
                .map_err(|e| PersistenceError::Decode(e.to_string()))?,
            created_at: parse_rfc3339(&created_at_raw)?,
        })
    })())
}

fn row_to_workflow_step(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<Result<WorkflowStep, PersistenceError>> {
    Ok((|| {
        let step_id_raw: String = row.get(0)?;
        let chat_id_raw: String = row.get(1)?;
        let operation: String = row.get(2)?;
        let arguments_raw: String = row.get(3)?;
        let input_file: Option<String> = row.get(4)?;
        let output_file: Option<String> = row.get(5)?;
        let status_raw: String = row.get(6)?;
        let progress: i64 = row.get(7)?;
        let error_message: Option<String> = row.get(8)?;
        let started_at_raw: Option<String> = row.get(9)?;
        let completed_at_raw: Option<String> = row.get(10)?;

        Ok(WorkflowStep {
            step_id: StepId::parse(&step_id_raw).map_err(PersistenceError::Decode)?,
            chat_id: ChatId::parse(&chat_id_raw).map_err(PersistenceError::Decode)?,
            operation,
            arguments: serde_json::from_str(&arguments_raw)
                .map_err(|e| PersistenceError::Decode(e.to_string()))?,
            input_file,
            output_file,
            status: StepStatus::parse(&status_raw)
                .ok_or_else(|| PersistenceError::Decode(format!("bad status `{status_raw}`")))?,
            progress: progress.clamp(0, 100) as u8,
            error_message,
            started_at: parse_rfc3339_opt(started_at_raw)?,
            completed_at: parse_rfc3339_opt(completed_at_raw)?,
        })
    })())
}

fn row_to_file_entry(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<Result<FileEntry, PersistenceError>> {
    Ok((|| {
        let chat_id_raw: String = row.get(0)?;
        let file_path: String = row.get(1)?;
        let role_raw: String = row.get(2)?;
        let created_at_raw: String = row.get(3)?;

        Ok(FileEntry {
            chat_id: ChatId::parse(&chat_id_raw).map_err(PersistenceError::Decode)?,
            file_path,
            role: FileRole::parse(&role_raw)
                .ok_or_else(|| PersistenceError::Decode(format!("bad role `{role_raw}`")))?,
            created_at: parse_rfc3339(&created_at_raw)?,
        })
    })())
}
