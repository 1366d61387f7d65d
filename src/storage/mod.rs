pub mod archive;
pub mod error;
pub mod layout;

pub use error::StorageError;
pub use layout::{compute_partition_key, sanitize_filename};

use crate::shared::fs_atomic::{atomic_write_file, canonicalize_existing};
use crate::shared::ids::ChatId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// The authoritative record written as `metadata.json` inside every
/// conversation directory; read back verbatim during restore (spec §4.2,
/// §6 "Persisted layout").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMetadata {
    pub chat_id: ChatId,
    pub partition_key: String,
    pub created_at: DateTime<Utc>,
    pub participant_name: String,
    pub status: String,
}

/// Partitioned on-disk layout for conversation uploads, outputs, and
/// archives (spec §4.2).
pub struct Storage {
    base_dir: PathBuf,
}

impl Storage {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn conversation_dir(&self, partition_key: &str, chat_id: &ChatId) -> PathBuf {
        self.base_dir.join(partition_key).join(chat_id.as_str())
    }

    pub fn dumps_dir(&self) -> PathBuf {
        self.base_dir.join("dumps")
    }

    pub fn create_conversation_skeleton(
        &self,
        partition_key: &str,
        chat_id: &ChatId,
        metadata: &ConversationMetadata,
    ) -> Result<(), StorageError> {
        let dir = self.conversation_dir(partition_key, chat_id);
        fs::create_dir_all(dir.join("uploads"))?;
        fs::create_dir_all(dir.join("outputs"))?;
        atomic_write_file(&dir.join("metadata.json"), &serde_json::to_vec(metadata)?)?;
        Ok(())
    }

    pub fn save_uploaded(
        &self,
        partition_key: &str,
        chat_id: &ChatId,
        filename: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, StorageError> {
        self.save_into(partition_key, chat_id, "uploads", filename, bytes)
    }

    pub fn save_output(
        &self,
        partition_key: &str,
        chat_id: &ChatId,
        filename: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, StorageError> {
        self.save_into(partition_key, chat_id, "outputs", filename, bytes)
    }

    fn save_into(
        &self,
        partition_key: &str,
        chat_id: &ChatId,
        subdir: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, StorageError> {
        sanitize_filename(filename)?;
        let dir = self.conversation_dir(partition_key, chat_id).join(subdir);
        fs::create_dir_all(&dir)?;
        let path = dir.join(filename);
        atomic_write_file(&path, bytes)?;
        Ok(path)
    }

    /// Reads a file by absolute path, verifying the resolved real path
    /// still lies within the conversation's directory (spec §4.2, §8
    /// "File path containing `..`").
    pub fn read(
        &self,
        partition_key: &str,
        chat_id: &ChatId,
        path: &Path,
    ) -> Result<Vec<u8>, StorageError> {
        let conversation_dir = self.conversation_dir(partition_key, chat_id);
        let canonical_root = canonicalize_existing(&conversation_dir)?;
        let canonical_target = canonicalize_existing(path)
            .map_err(|_| StorageError::FileNotFound(path.display().to_string()))?;
        if !canonical_target.starts_with(&canonical_root) {
            return Err(StorageError::PathEscape(path.display().to_string()));
        }
        fs::read(&canonical_target).map_err(StorageError::from)
    }

    pub fn delete_conversation(
        &self,
        partition_key: &str,
        chat_id: &ChatId,
    ) -> Result<(), StorageError> {
        let dir = self.conversation_dir(partition_key, chat_id);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }

    /// Writes an auxiliary export file (e.g. `messages.json`) directly
    /// into the conversation directory root, so it rides along with the
    /// uploads/outputs when the directory is archived. This is what lets
    /// `dump` capture more than files — the §8 round-trip law requires
    /// message and workflow-step sequences to survive dump/restore too.
    pub fn write_export_file(
        &self,
        partition_key: &str,
        chat_id: &ChatId,
        name: &str,
        bytes: &[u8],
    ) -> Result<(), StorageError> {
        let dir = self.conversation_dir(partition_key, chat_id);
        fs::create_dir_all(&dir)?;
        atomic_write_file(&dir.join(name), bytes)?;
        Ok(())
    }

    pub fn read_export_file(
        &self,
        conversation_dir: &Path,
        name: &str,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        let path = conversation_dir.join(name);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read(&path)?))
    }

    pub fn dump(&self, partition_key: &str, chat_id: &ChatId) -> Result<PathBuf, StorageError> {
        let dir = self.conversation_dir(partition_key, chat_id);
        archive::dump_conversation(&dir, &self.dumps_dir(), chat_id.as_str())
    }

    pub fn restore(&self, archive_bytes: &[u8]) -> Result<archive::RestoreOutcome, StorageError> {
        archive::restore_conversation(&self.base_dir, archive_bytes)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::MalformedArchive(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_metadata(chat_id: &ChatId, partition_key: &str) -> ConversationMetadata {
        ConversationMetadata {
            chat_id: chat_id.clone(),
            partition_key: partition_key.to_string(),
            created_at: Utc::now(),
            participant_name: "BlueWhale-4821".to_string(),
            status: "created".to_string(),
        }
    }

    #[test]
    fn save_and_read_uploaded_file_round_trips() {
        let base = tempdir().expect("tempdir");
        let storage = Storage::new(base.path().to_path_buf());
        let chat_id = ChatId::new_random();
        let metadata = sample_metadata(&chat_id, "2026/02");
        storage
            .create_conversation_skeleton("2026/02", &chat_id, &metadata)
            .expect("create skeleton");
        let path = storage
            .save_uploaded("2026/02", &chat_id, "data.csv", b"a,b\n1,2\n")
            .expect("save");
        let bytes = storage.read("2026/02", &chat_id, &path).expect("read");
        assert_eq!(bytes, b"a,b\n1,2\n");
    }

    #[test]
    fn read_rejects_path_outside_conversation_dir() {
        let base = tempdir().expect("tempdir");
        let storage = Storage::new(base.path().to_path_buf());
        let chat_id = ChatId::new_random();
        let metadata = sample_metadata(&chat_id, "2026/02");
        storage
            .create_conversation_skeleton("2026/02", &chat_id, &metadata)
            .expect("create skeleton");

        let outside = base.path().join("outside.txt");
        fs::write(&outside, b"secret").unwrap();

        let err = storage
            .read("2026/02", &chat_id, &outside)
            .expect_err("should reject escape");
        assert!(matches!(err, StorageError::PathEscape(_)));
    }

    #[test]
    fn delete_conversation_removes_directory() {
        let base = tempdir().expect("tempdir");
        let storage = Storage::new(base.path().to_path_buf());
        let chat_id = ChatId::new_random();
        let metadata = sample_metadata(&chat_id, "2026/02");
        storage
            .create_conversation_skeleton("2026/02", &chat_id, &metadata)
            .expect("create skeleton");
        storage
            .delete_conversation("2026/02", &chat_id)
            .expect("delete");
        assert!(!storage.conversation_dir("2026/02", &chat_id).exists());
    }
}
