//! The conversational layer: state machine, intent classifier, handler
//! chain, workflow executor, and the `ChatService` that composes them
//! with the Repository and Job Manager (spec §4.9-§4.12).

pub mod context;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod intent;
pub mod service;
pub mod state_machine;

pub use error::ChatError;
pub use service::{ChatService, ConfirmOutcome, SendMessageResponse, UploadFileResponse};
pub use state_machine::ChatState;
