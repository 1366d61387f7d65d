#[derive(Debug, thiserror::Error)]
pub enum WsError {
    #[error("websocket hub is at capacity ({0} connections)")]
    AtCapacity(usize),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("the cross-thread bridge has not been installed yet")]
    BridgeNotReady,
    #[error("the cross-thread bridge has already been installed")]
    BridgeAlreadyInstalled,
}
