use super::{ConversationMetadata, StorageError};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Outcome of extracting and relocating a restored conversation archive.
pub struct RestoreOutcome {
    pub metadata: ConversationMetadata,
    pub conversation_dir: PathBuf,
}

/// tar+gzip the conversation directory into `<base>/dumps/<chat_id>_<timestamp>.tar.gz`
/// (spec §4.2 dump).
pub fn dump_conversation(
    conversation_dir: &Path,
    dumps_dir: &Path,
    chat_id: &str,
) -> Result<PathBuf, StorageError> {
    if !conversation_dir.is_dir() {
        return Err(StorageError::FileNotFound(
            conversation_dir.display().to_string(),
        ));
    }
    fs::create_dir_all(dumps_dir)?;
    let timestamp = unix_millis();
    let archive_path = dumps_dir.join(format!("{chat_id}_{timestamp}.tar.gz"));

    let file = File::create(&archive_path)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all(".", conversation_dir)?;
    builder.into_inner()?.finish()?;

    Ok(archive_path)
}

/// Extracts an archive to a scratch directory under `<base>/tmp/`, reads
/// `metadata.json` for the authoritative `partition_key`, then atomically
/// relocates it to `<base>/<partition_key>/<chat_id>/`, replacing any
/// preexisting directory at that path (spec §4.2 restore).
pub fn restore_conversation(
    base_dir: &Path,
    archive_bytes: &[u8],
) -> Result<RestoreOutcome, StorageError> {
    let tmp_root = base_dir.join("tmp").join(format!(
        "restore-{}-{}",
        std::process::id(),
        unix_millis()
    ));
    fs::create_dir_all(&tmp_root)?;

    let decoder = GzDecoder::new(archive_bytes);
    let mut archive = tar::Archive::new(decoder);
    archive
        .unpack(&tmp_root)
        .map_err(|err| StorageError::MalformedArchive(err.to_string()))?;

    let metadata_path = tmp_root.join("metadata.json");
    let metadata_raw = fs::read_to_string(&metadata_path).map_err(|_| {
        StorageError::MalformedArchive("archive is missing metadata.json".to_string())
    })?;
    let metadata: ConversationMetadata = serde_json::from_str(&metadata_raw)
        .map_err(|err| StorageError::MalformedArchive(err.to_string()))?;

    let final_dir = base_dir
        .join(&metadata.partition_key)
        .join(metadata.chat_id.as_str());
    if let Some(parent) = final_dir.parent() {
        fs::create_dir_all(parent)?;
    }
    if final_dir.exists() {
        fs::remove_dir_all(&final_dir)?;
    }
    fs::rename(&tmp_root, &final_dir)?;

    Ok(RestoreOutcome {
        metadata,
        conversation_dir: final_dir,
    })
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::ids::ChatId;
    use tempfile::tempdir;

    #[test]
    fn dump_then_restore_round_trips_files() {
        let base = tempdir().expect("tempdir");
        let chat_id = ChatId::new_random();
        let partition_key = "2026/02".to_string();
        let conversation_dir = base.path().join(&partition_key).join(chat_id.as_str());
        fs::create_dir_all(conversation_dir.join("uploads")).unwrap();
        fs::write(conversation_dir.join("uploads/data.csv"), b"a,b\n1,2\n").unwrap();

        let metadata = ConversationMetadata {
            chat_id: chat_id.clone(),
            partition_key: partition_key.clone(),
            created_at: crate::shared::time::now(),
            participant_name: "BlueWhale-4821".to_string(),
            status: "created".to_string(),
        };
        fs::write(
            conversation_dir.join("metadata.json"),
            serde_json::to_vec(&metadata).unwrap(),
        )
        .unwrap();

        let dumps_dir = base.path().join("dumps");
        let archive_path =
            dump_conversation(&conversation_dir, &dumps_dir, chat_id.as_str()).expect("dump");
        assert!(archive_path.exists());

        fs::remove_dir_all(&conversation_dir).unwrap();

        let archive_bytes = fs::read(&archive_path).unwrap();
        let outcome = restore_conversation(base.path(), &archive_bytes).expect("restore");
        assert_eq!(outcome.metadata.chat_id, chat_id);
        assert!(outcome.conversation_dir.join("uploads/data.csv").exists());
    }

    #[test]
    fn restore_rejects_archive_without_metadata() {
        let base = tempdir().expect("tempdir");
        let file = File::create(base.path().join("bad.tar.gz")).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let empty_dir = tempdir().unwrap();
        builder.append_dir_all(".", empty_dir.path()).unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let bytes = fs::read(base.path().join("bad.tar.gz")).unwrap();
        let err = restore_conversation(base.path(), &bytes).expect_err("should fail");
        assert!(matches!(err, StorageError::MalformedArchive(_)));
    }
}
