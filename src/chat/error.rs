use super::state_machine::IllegalTransition;
use crate::domain::conversation::ConversationTransitionError;
use crate::jobs::JobsError;
use crate::registry::RegistryError;
use crate::repository::RepositoryError;
use crate::storage::StorageError;
use crate::ws::WsError;

/// Composed error taxonomy for the chat layer (spec §7). Lower-layer
/// errors wrap via `#[from]`, matching the teacher's `OrchestratorError`
/// wrapping `ConfigError`/`QueueError` rather than a single flat enum.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("conversation not found")]
    ConversationNotFound,
    #[error("job {0} not found")]
    JobNotFound(String),
    #[error("bad input: {0}")]
    BadInput(String),
    #[error("no pending workflow to confirm")]
    NoPendingWorkflow,
    #[error("illegal state transition: {0}")]
    IllegalStateTransition(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Jobs(#[from] JobsError),
    #[error(transparent)]
    Ws(#[from] WsError),
}

impl From<ConversationTransitionError> for ChatError {
    fn from(err: ConversationTransitionError) -> Self {
        ChatError::IllegalStateTransition(err.to_string())
    }
}

impl From<IllegalTransition> for ChatError {
    fn from(err: IllegalTransition) -> Self {
        ChatError::IllegalStateTransition(err.to_string())
    }
}
