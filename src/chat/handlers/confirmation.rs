use super::{normalized, ChatError, ConversationContext, HandlerInput, HandlerOutcome, IntentClassifier, MessageHandler};
use crate::chat::state_machine::ChatState;
use chrono::{DateTime, Utc};

const YES_WORDS: &[&str] = &["yes", "y", "ok", "proceed"];
const NO_WORDS: &[&str] = &["no", "n"];

/// Active only while a proposal is pending (spec §4.10 item 2). Maps the
/// user's yes/no answer onto a `ConfirmDecision`; the Chat Service turns
/// that into the actual `confirm_workflow` call.
pub struct ConfirmationHandler;

impl MessageHandler for ConfirmationHandler {
    fn name(&self) -> &'static str {
        "confirmation"
    }

    fn can_handle(&self, input: &HandlerInput, context: &ConversationContext) -> bool {
        let HandlerInput::Text(text) = input else {
            return false;
        };
        if context.state != ChatState::AwaitingConfirmation {
            return false;
        }
        let normalized = normalized(text);
        YES_WORDS.contains(&normalized.as_str()) || NO_WORDS.contains(&normalized.as_str())
    }

    fn handle(
        &self,
        input: &HandlerInput,
        _context: &mut ConversationContext,
        _classifier: &IntentClassifier,
        _now: DateTime<Utc>,
    ) -> Result<HandlerOutcome, ChatError> {
        let HandlerInput::Text(text) = input else {
            return Err(ChatError::BadInput("confirmation handler requires text".to_string()));
        };
        let normalized = normalized(text);
        let confirmed = YES_WORDS.contains(&normalized.as_str());
        Ok(HandlerOutcome::ConfirmDecision { confirmed })
    }
}
