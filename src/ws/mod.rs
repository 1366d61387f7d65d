pub mod bridge;
pub mod error;
pub mod events;
pub mod hub;

pub use error::WsError;
pub use events::{ClientFrame, ServerEvent};
pub use hub::Hub;
