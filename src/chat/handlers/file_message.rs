use super::{ChatError, ConversationContext, HandlerInput, HandlerOutcome, IntentClassifier, MessageHandler};
use crate::chat::state_machine::ChatState;
use chrono::{DateTime, Utc};

/// Invoked by the upload endpoint (spec §4.10 item 3). If the user
/// already described an intent in an earlier text message (cached on
/// the context as `last_proposed_steps`), the now-available file lets
/// that proposal become concrete; otherwise this just acknowledges the
/// upload and waits for instructions.
pub struct FileMessageHandler;

impl MessageHandler for FileMessageHandler {
    fn name(&self) -> &'static str {
        "file_message"
    }

    fn can_handle(&self, input: &HandlerInput, _context: &ConversationContext) -> bool {
        matches!(input, HandlerInput::FileUploaded { .. })
    }

    fn handle(
        &self,
        input: &HandlerInput,
        context: &mut ConversationContext,
        _classifier: &IntentClassifier,
        _now: DateTime<Utc>,
    ) -> Result<HandlerOutcome, ChatError> {
        let HandlerInput::FileUploaded { filename } = input else {
            return Err(ChatError::BadInput("file handler requires a file upload".to_string()));
        };

        if let Some(steps) = context.last_proposed_steps.take() {
            return Ok(HandlerOutcome::Message {
                content: format!(
                    "Got `{filename}`. Here's the workflow I'll run based on what you asked for — reply yes to proceed or no to cancel."
                ),
                pending_workflow: Some(steps),
                next_state: Some(ChatState::AwaitingConfirmation),
            });
        }

        let next_state = (context.state == ChatState::Idle).then_some(ChatState::AwaitingFile);
        Ok(HandlerOutcome::Message {
            content: format!("Got `{filename}`. What would you like me to do with it?"),
            pending_workflow: None,
            next_state,
        })
    }
}

