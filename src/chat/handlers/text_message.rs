use super::{ChatError, ConversationContext, HandlerInput, HandlerOutcome, IntentClassifier, MessageHandler};
use crate::chat::intent::{steps_to_json, IntentKind};
use crate::chat::state_machine::ChatState;
use chrono::{DateTime, Utc};

const UNKNOWN_TEXT: &str = "I didn't catch what you'd like to do. Try something like \"extract columns: name, email\", or say \"help\".";

/// Fallback of last resort (spec §4.10 item 4): free text that wasn't a
/// system command or a pending confirmation goes to the Intent
/// Classifier.
pub struct TextMessageHandler;

impl MessageHandler for TextMessageHandler {
    fn name(&self) -> &'static str {
        "text_message"
    }

    fn can_handle(&self, input: &HandlerInput, _context: &ConversationContext) -> bool {
        matches!(input, HandlerInput::Text(_))
    }

    fn handle(
        &self,
        input: &HandlerInput,
        context: &mut ConversationContext,
        classifier: &IntentClassifier,
        _now: DateTime<Utc>,
    ) -> Result<HandlerOutcome, ChatError> {
        let HandlerInput::Text(text) = input else {
            return Err(ChatError::BadInput("text handler requires text".to_string()));
        };

        let classification = classifier.classify(text, context.has_uploaded_file());
        context.last_intent = Some(classification.kind.as_str().to_string());

        if classification.kind == IntentKind::Unknown {
            return Ok(HandlerOutcome::Message {
                content: UNKNOWN_TEXT.to_string(),
                pending_workflow: None,
                next_state: None,
            });
        }

        let steps_json = steps_to_json(&classification.proposed_steps);

        if classification.requires_file {
            context.last_proposed_steps = Some(steps_json);
            let next_state = (context.state == ChatState::Idle).then_some(ChatState::AwaitingFile);
            return Ok(HandlerOutcome::Message {
                content: format!(
                    "Got it — I'll run a {} workflow once you upload a file.",
                    classification.kind.as_str()
                ),
                pending_workflow: None,
                next_state,
            });
        }

        Ok(HandlerOutcome::Message {
            content: "Here's the workflow I'll run — reply yes to proceed or no to cancel.".to_string(),
            pending_workflow: Some(steps_json),
            next_state: Some(ChatState::AwaitingConfirmation),
        })
    }
}
