#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("{0}")]
    Failed(String),
    #[error("malformed table input: {0}")]
    MalformedTable(String),
}
