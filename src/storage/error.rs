#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("path escapes the conversation directory: {0}")]
    PathEscape(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed archive: {0}")]
    MalformedArchive(String),
}
