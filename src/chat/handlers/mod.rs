//! Message Handler Chain of Responsibility (spec §4.10).
//!
//! Grounded in the teacher's `app::command_dispatch` dispatch pattern:
//! an ordered list of candidates, each deciding for itself whether it
//! applies, with typed outcomes instead of raw strings. The teacher
//! dispatches by function id in one big match; here the chain is a
//! `Vec<Box<dyn MessageHandler>>` walked in order because the set of
//! handlers is small and each has genuinely different applicability
//! logic rather than a shared id space.
//!
//! Handlers never mutate conversation *state* themselves — they return
//! an outcome, and the Chat Service is the single place state
//! transitions happen (spec §4.9's "State Manager validates every
//! transition"). Handlers may cache bookkeeping fields on the context
//! (`last_intent`) but not the state machine itself.

mod confirmation;
mod file_message;
mod system_command;
mod text_message;

pub use confirmation::ConfirmationHandler;
pub use file_message::FileMessageHandler;
pub use system_command::SystemCommandHandler;
pub use text_message::TextMessageHandler;

use super::context::ConversationContext;
use super::error::ChatError;
use super::intent::IntentClassifier;
use super::state_machine::ChatState;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone)]
pub enum HandlerInput {
    Text(String),
    FileUploaded { filename: String },
}

#[derive(Debug, Clone)]
pub enum HandlerOutcome {
    /// Emit a system message, optionally carrying a workflow proposal,
    /// optionally moving the conversation to `next_state`.
    Message {
        content: String,
        pending_workflow: Option<JsonValue>,
        next_state: Option<ChatState>,
    },
    /// The user answered a pending confirmation.
    ConfirmDecision { confirmed: bool },
}

pub trait MessageHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn can_handle(&self, input: &HandlerInput, context: &ConversationContext) -> bool;
    fn handle(
        &self,
        input: &HandlerInput,
        context: &mut ConversationContext,
        classifier: &IntentClassifier,
        now: DateTime<Utc>,
    ) -> Result<HandlerOutcome, ChatError>;
}

/// Ordered chain; the first handler whose `can_handle` returns true
/// gets to `handle`. If `handle` itself fails, control falls through to
/// the next candidate rather than aborting (spec §4.10 "explicit
/// fallthrough flag").
pub struct HandlerChain {
    handlers: Vec<Box<dyn MessageHandler>>,
}

impl HandlerChain {
    pub fn new(handlers: Vec<Box<dyn MessageHandler>>) -> Self {
        Self { handlers }
    }

    pub fn default_chain() -> Self {
        Self::new(vec![
            Box::new(SystemCommandHandler),
            Box::new(ConfirmationHandler),
            Box::new(FileMessageHandler),
            Box::new(TextMessageHandler),
        ])
    }

    pub fn dispatch(
        &self,
        input: &HandlerInput,
        context: &mut ConversationContext,
        classifier: &IntentClassifier,
        now: DateTime<Utc>,
    ) -> Result<HandlerOutcome, ChatError> {
        let mut last_err = None;
        for handler in &self.handlers {
            if !handler.can_handle(input, context) {
                continue;
            }
            match handler.handle(input, context, classifier, now) {
                Ok(outcome) => return Ok(outcome),
                Err(err) => {
                    last_err = Some(err);
                    continue;
                }
            }
        }
        Err(last_err.unwrap_or_else(|| ChatError::BadInput("no handler accepted this input".to_string())))
    }
}

impl Default for HandlerChain {
    fn default() -> Self {
        Self::default_chain()
    }
}

pub(super) fn normalized(text: &str) -> String {
    text.trim().to_lowercase()
}
