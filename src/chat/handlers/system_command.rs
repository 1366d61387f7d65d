use super::{normalized, ChatError, ConversationContext, HandlerInput, HandlerOutcome, IntentClassifier, MessageHandler};
use crate::chat::state_machine::ChatState;
use chrono::{DateTime, Utc};

const HELP_TEXT: &str = "Upload a file and tell me what you'd like done with it (e.g. \"extract columns: name, email\"). Say \"cancel\" at any time to start over.";

/// Recognizes `help` and `cancel` regardless of conversation state (spec
/// §4.10 item 1). Confirmation words (`yes`/`no`/...) are left to
/// `ConfirmationHandler`, which only applies while a proposal is
/// pending — keeping the two from racing over the same input.
pub struct SystemCommandHandler;

impl MessageHandler for SystemCommandHandler {
    fn name(&self) -> &'static str {
        "system_command"
    }

    fn can_handle(&self, input: &HandlerInput, context: &ConversationContext) -> bool {
        let HandlerInput::Text(text) = input else {
            return false;
        };
        if !context.state.accepts_special_commands() {
            return false;
        }
        matches!(normalized(text).as_str(), "help" | "cancel")
    }

    fn handle(
        &self,
        input: &HandlerInput,
        _context: &mut ConversationContext,
        _classifier: &IntentClassifier,
        _now: DateTime<Utc>,
    ) -> Result<HandlerOutcome, ChatError> {
        let HandlerInput::Text(text) = input else {
            return Err(ChatError::BadInput("system command handler requires text".to_string()));
        };
        match normalized(text).as_str() {
            "help" => Ok(HandlerOutcome::Message {
                content: HELP_TEXT.to_string(),
                pending_workflow: None,
                next_state: None,
            }),
            "cancel" => Ok(HandlerOutcome::Message {
                content: "Cancelled. Starting over.".to_string(),
                pending_workflow: None,
                next_state: Some(ChatState::Idle),
            }),
            _ => unreachable!("can_handle already filtered to help/cancel"),
        }
    }
}
