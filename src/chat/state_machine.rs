//! Per-conversation state machine (spec §4.9).
//!
//! This is a richer, chat-layer-only state graph layered on top of
//! `domain::conversation::ConversationStatus`; the domain status tracks
//! only whether a workflow run is in flight, while this one tracks the
//! conversational turn the user is on. Grounded in the same
//! table-driven transition pattern as `ConversationStatus::can_transition_to`.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatState {
    Idle,
    AwaitingFile,
    AwaitingConfirmation,
    Processing,
    Completed,
    Failed,
}

impl ChatState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatState::Idle => "idle",
            ChatState::AwaitingFile => "awaiting_file",
            ChatState::AwaitingConfirmation => "awaiting_confirmation",
            ChatState::Processing => "processing",
            ChatState::Completed => "completed",
            ChatState::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ChatState::Completed | ChatState::Failed)
    }

    /// `help`/`cancel` are accepted in every state except the terminal
    /// ones, per spec §4.9.
    pub fn accepts_special_commands(self) -> bool {
        !self.is_terminal()
    }

    fn can_transition_to(self, next: ChatState) -> bool {
        use ChatState::*;
        matches!(
            (self, next),
            (Idle, Idle)
                | (Idle, AwaitingFile)
                | (Idle, AwaitingConfirmation)
                | (AwaitingFile, AwaitingConfirmation)
                | (AwaitingFile, Idle)
                | (AwaitingConfirmation, Processing)
                | (AwaitingConfirmation, Idle)
                | (Processing, Idle)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Completed, Idle)
                | (Failed, Idle)
        )
    }
}

impl fmt::Display for ChatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("illegal chat state transition from {from} to {to}")]
pub struct IllegalTransition {
    pub from: ChatState,
    pub to: ChatState,
}

/// Validates and applies a transition in place; returns the previous
/// state on success.
pub fn transition(current: &mut ChatState, next: ChatState) -> Result<ChatState, IllegalTransition> {
    if !current.can_transition_to(next) {
        return Err(IllegalTransition {
            from: *current,
            to: next,
        });
    }
    let previous = *current;
    *current = next;
    Ok(previous)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_can_reach_awaiting_confirmation_directly() {
        let mut state = ChatState::Idle;
        transition(&mut state, ChatState::AwaitingConfirmation).unwrap();
        assert_eq!(state, ChatState::AwaitingConfirmation);
    }

    #[test]
    fn terminal_states_reject_special_command_shortcuts_but_allow_restart() {
        let mut state = ChatState::Completed;
        assert!(!state.accepts_special_commands());
        transition(&mut state, ChatState::Idle).unwrap();
        assert_eq!(state, ChatState::Idle);
    }

    #[test]
    fn processing_cannot_jump_back_to_awaiting_confirmation() {
        let mut state = ChatState::Processing;
        let err = transition(&mut state, ChatState::AwaitingConfirmation).unwrap_err();
        assert_eq!(err.from, ChatState::Processing);
    }
}
