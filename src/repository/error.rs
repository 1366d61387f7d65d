use crate::persistence::PersistenceError;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("conversation not found")]
    ConversationNotFound,
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
