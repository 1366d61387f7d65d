use super::StorageError;
use crate::config::PartitionStrategy;
use crate::shared::ids::ChatId;
use chrono::{DateTime, Utc};

/// Computes the frozen `partition_key` for a conversation at creation time
/// (spec §4.2). Time-based partitions group by calendar month; hash-based
/// partitions group by the first four hex-ish characters of the chat id.
pub fn compute_partition_key(
    strategy: PartitionStrategy,
    time_format: &str,
    chat_id: &ChatId,
    created_at: DateTime<Utc>,
) -> String {
    match strategy {
        PartitionStrategy::TimeBased => created_at.format(time_format).to_string(),
        PartitionStrategy::HashBased => {
            let raw = chat_id.as_str().replace('-', "");
            let first2 = &raw[..raw.len().min(2)];
            let next2 = &raw[raw.len().min(2)..raw.len().min(4)];
            format!("{first2}/{next2}")
        }
    }
}

/// Rejects filenames with path separators, null bytes, or `..` components
/// before any I/O is attempted (spec §4.2, §8 boundary behavior).
pub fn sanitize_filename(filename: &str) -> Result<(), StorageError> {
    if filename.is_empty() {
        return Err(StorageError::PathEscape("empty filename".to_string()));
    }
    if filename.contains('\0') {
        return Err(StorageError::PathEscape(filename.to_string()));
    }
    if filename.contains('/') || filename.contains('\\') {
        return Err(StorageError::PathEscape(filename.to_string()));
    }
    if filename == ".." || filename == "." {
        return Err(StorageError::PathEscape(filename.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_based_partition_splits_first_four_chars() {
        let chat_id = ChatId::parse("abcd1234-xyz").expect("parse");
        let key = compute_partition_key(PartitionStrategy::HashBased, "%Y/%m", &chat_id, Utc::now());
        assert_eq!(key, "ab/cd");
    }

    #[test]
    fn time_based_partition_uses_configured_format() {
        let chat_id = ChatId::new_random();
        let when = DateTime::parse_from_rfc3339("2026-02-08T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let key = compute_partition_key(PartitionStrategy::TimeBased, "%Y/%m", &chat_id, when);
        assert_eq!(key, "2026/02");
    }

    #[test]
    fn rejects_traversal_and_separators() {
        assert!(sanitize_filename("../etc/passwd").is_err());
        assert!(sanitize_filename("a/b").is_err());
        assert!(sanitize_filename("a\0b").is_err());
        assert!(sanitize_filename("data.xlsx").is_ok());
    }
}
