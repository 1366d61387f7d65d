//! REST/WebSocket wire contracts (spec §6, SPEC_FULL §6 [AMBIENT]).
//!
//! Plain `serde`-derived request/response bodies and the shared envelope;
//! no HTTP framework or routing lives here, matching the teacher's
//! `channels::slack::api` split between wire shapes and the client that
//! moves them. An external HTTP layer serializes these directly.

pub mod envelope;
pub mod requests;
pub mod responses;

pub use envelope::ApiEnvelope;
