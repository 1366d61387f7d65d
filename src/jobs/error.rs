#[derive(Debug, thiserror::Error)]
pub enum JobsError {
    #[error("job {0} not found")]
    NotFound(String),
    #[error("job manager worker pool has shut down")]
    PoolShutdown,
}
