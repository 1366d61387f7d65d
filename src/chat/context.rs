//! In-memory conversation context: a cache over the Repository (spec §9).
//!
//! "ConversationContext is a cache over the Repository; cache reads are
//! allowed to be stale only for non-file fields" — so every operation
//! that touches uploaded/output files resyncs them from the Repository
//! first. The state machine, last intent, and pending proposal live only
//! here and are never reconstructed from persisted state other than at
//! cold-start rebuild.

use super::state_machine::ChatState;
use crate::domain::{Conversation, ConversationStatus, FileRole};
use crate::shared::ids::ChatId;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

pub struct ConversationContext {
    pub chat_id: ChatId,
    pub state: ChatState,
    pub last_intent: Option<String>,
    pub last_proposed_steps: Option<JsonValue>,
    pub pending_workflow: Option<JsonValue>,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub uploaded_files: Vec<String>,
    pub output_files: Vec<String>,
}

impl ConversationContext {
    fn new(chat_id: ChatId, now: DateTime<Utc>) -> Self {
        Self {
            chat_id,
            state: ChatState::Idle,
            last_intent: None,
            last_proposed_steps: None,
            pending_workflow: None,
            message_count: 0,
            created_at: now,
            last_activity_at: now,
            uploaded_files: Vec::new(),
            output_files: Vec::new(),
        }
    }

    /// Rebuilds a context from a freshly-loaded `Conversation`, used both
    /// for cold start (a fresh `ChatService` that has never seen this
    /// chat id) and for the per-call file resync.
    ///
    /// Terminal persisted status always wins over in-memory state: a
    /// background job completing or failing on a different thread (or a
    /// different process entirely, spec §8 scenario 5) is the only way a
    /// conversation reaches `completed`/`failed`, so a context that still
    /// reads `processing` here is simply stale.
    pub(crate) fn rebuild_from(&mut self, conversation: &Conversation, now: DateTime<Utc>) {
        self.message_count = conversation.messages.len();
        self.uploaded_files = conversation.uploaded_files.clone();
        self.output_files = conversation.output_files.clone();
        self.last_activity_at = now;
        match conversation.status {
            ConversationStatus::Completed => self.state = ChatState::Completed,
            ConversationStatus::Failed => self.state = ChatState::Failed,
            ConversationStatus::Created | ConversationStatus::Processing => {}
        }
    }

    fn from_conversation(conversation: &Conversation, now: DateTime<Utc>) -> Self {
        let mut context = ConversationContext::new(conversation.chat_id.clone(), conversation.created_at);
        context.rebuild_from(conversation, now);
        context
    }

    pub fn has_uploaded_file(&self) -> bool {
        !self.uploaded_files.is_empty()
    }

    pub fn latest_uploaded_file(&self) -> Option<&str> {
        self.uploaded_files.last().map(String::as_str)
    }

    pub fn record_file(&mut self, path: &str, role: FileRole) {
        let bucket = match role {
            FileRole::Uploaded => &mut self.uploaded_files,
            FileRole::Output => &mut self.output_files,
        };
        if !bucket.iter().any(|existing| existing == path) {
            bucket.push(path.to_string());
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = now;
    }

    fn is_idle_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let Ok(age) = now.signed_duration_since(self.last_activity_at).to_std() else {
            return false;
        };
        age >= ttl
    }
}

/// Process-wide map of live conversation contexts, keyed by chat id.
/// Entries are created lazily on first touch and evicted after
/// `idle_ttl` of inactivity (spec §4.9).
pub struct ContextStore {
    contexts: Mutex<HashMap<ChatId, ConversationContext>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self {
            contexts: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `f` against the context for `chat_id`, creating it from
    /// `conversation` if this is the first time this process has seen
    /// the chat (the cross-request / fresh-instance visibility case,
    /// spec §8 scenario 5).
    pub fn with_context<R>(
        &self,
        conversation: &Conversation,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut ConversationContext) -> R,
    ) -> R {
        let mut contexts = self.contexts.lock().expect("context store poisoned");
        let context = contexts
            .entry(conversation.chat_id.clone())
            .or_insert_with(|| ConversationContext::from_conversation(conversation, now));
        context.touch(now);
        f(context)
    }

    pub fn remove(&self, chat_id: &ChatId) {
        self.contexts.lock().expect("context store poisoned").remove(chat_id);
    }

    /// Drops contexts idle for longer than `ttl`; returns how many were
    /// evicted.
    pub fn evict_idle(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let mut contexts = self.contexts.lock().expect("context store poisoned");
        let before = contexts.len();
        contexts.retain(|_, context| !context.is_idle_expired(now, ttl));
        before - contexts.len()
    }
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_conversation() -> Conversation {
        Conversation::new(
            ChatId::new_random(),
            "BlueWhale-4821".to_string(),
            "2026/07".to_string(),
            Utc::now(),
        )
    }

    #[test]
    fn first_touch_creates_context_at_idle() {
        let store = ContextStore::new();
        let conversation = sample_conversation();
        let now = Utc::now();
        let state = store.with_context(&conversation, now, |ctx| ctx.state);
        assert_eq!(state, ChatState::Idle);
    }

    #[test]
    fn record_file_is_idempotent() {
        let store = ContextStore::new();
        let conversation = sample_conversation();
        let now = Utc::now();
        store.with_context(&conversation, now, |ctx| {
            ctx.record_file("uploads/data.csv", FileRole::Uploaded);
            ctx.record_file("uploads/data.csv", FileRole::Uploaded);
        });
        let count = store.with_context(&conversation, now, |ctx| ctx.uploaded_files.len());
        assert_eq!(count, 1);
    }

    #[test]
    fn rebuild_adopts_terminal_status_from_a_background_job_on_another_thread() {
        let store = ContextStore::new();
        let mut conversation = sample_conversation();
        let now = Utc::now();
        store.with_context(&conversation, now, |ctx| {
            ctx.state = ChatState::Processing;
        });

        conversation.status = ConversationStatus::Completed;
        let state = store.with_context(&conversation, now, |ctx| {
            ctx.rebuild_from(&conversation, now);
            ctx.state
        });
        assert_eq!(state, ChatState::Completed);
    }

    #[test]
    fn evict_idle_drops_stale_contexts() {
        let store = ContextStore::new();
        let conversation = sample_conversation();
        let now = Utc::now();
        store.with_context(&conversation, now, |_| {});
        let later = now + chrono::Duration::seconds(7200);
        let evicted = store.evict_idle(later, Duration::from_secs(3600));
        assert_eq!(evicted, 1);
    }
}
