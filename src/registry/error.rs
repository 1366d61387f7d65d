#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown operation `{0}`")]
    UnknownOperation(String),
    #[error("argument `{key}` for operation `{operation_id}`: {reason}")]
    InvalidArgument {
        operation_id: String,
        key: String,
        reason: String,
    },
    #[error("unknown argument `{key}` for operation `{operation_id}`")]
    UnknownArgument { operation_id: String, key: String },
}
