//! The Chat Service: composes the State Manager, Handler Chain, Intent
//! Classifier, Repository, Job Manager, and Bridge into the user-facing
//! operations of the REST/WS surface (spec §4.12).

use super::context::ContextStore;
use super::error::ChatError;
use super::executor::WorkflowExecutor;
use super::handlers::{HandlerChain, HandlerInput, HandlerOutcome};
use super::intent::IntentClassifier;
use super::state_machine::{self, ChatState};
use crate::domain::job::BackgroundJob;
use crate::domain::workflow_step::WorkflowStep;
use crate::domain::{Conversation, ConversationStatus, FileRole, MessageType};
use crate::jobs::JobManager;
use crate::registry::OperationRegistry;
use crate::repository::Repository;
use crate::shared::ids::{generate_job_id, ChatId, JobId};
use crate::storage::sanitize_filename;
use crate::ws::{bridge, ServerEvent};
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub struct SendMessageResponse {
    pub bot_response: String,
    pub suggested_workflow: Option<JsonValue>,
    pub requires_confirmation: bool,
    pub requires_file: bool,
}

pub struct UploadFileResponse {
    pub file_path: String,
    pub bot_response: String,
    pub suggested_workflow: Option<JsonValue>,
}

#[derive(Debug)]
pub enum ConfirmOutcome {
    Submitted { job_id: String, status: &'static str },
    Declined { bot_response: String },
    Completed { bot_response: String, output_files: Vec<String> },
}

/// The part of the service that must outlive a single HTTP request — a
/// background job's task closure captures a clone of this `Arc` so the
/// Workflow Executor can run on a worker thread without borrowing from
/// anything request-scoped (spec §9 "global registries... passed as
/// explicit references rather than ambient globals").
struct ChatServiceInner {
    repository: Repository,
    registry: OperationRegistry,
    step_timeout: Duration,
}

pub struct ChatService {
    inner: Arc<ChatServiceInner>,
    jobs: JobManager,
    contexts: ContextStore,
    classifier: IntentClassifier,
    handlers: HandlerChain,
}

impl ChatService {
    pub fn new(
        repository: Repository,
        registry: OperationRegistry,
        jobs: JobManager,
        step_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(ChatServiceInner {
                repository,
                registry,
                step_timeout,
            }),
            jobs,
            contexts: ContextStore::new(),
            classifier: IntentClassifier::new(),
            handlers: HandlerChain::default_chain(),
        }
    }

    fn load_conversation(&self, chat_id: &ChatId) -> Result<Conversation, ChatError> {
        self.inner
            .repository
            .get_conversation(chat_id)?
            .ok_or(ChatError::ConversationNotFound)
    }

    pub fn create_conversation(&self) -> Result<Conversation, ChatError> {
        let conversation = self.inner.repository.create_conversation()?;
        let welcome = format!(
            "Hi, I'm {}. Upload a file and tell me what you'd like done with it (or say \"help\").",
            conversation.participant_name
        );
        self.inner
            .repository
            .add_message(&conversation.chat_id, MessageType::System, welcome, BTreeMap::new())?;
        self.load_conversation(&conversation.chat_id)
    }

    pub fn list_conversations(
        &self,
        status: Option<ConversationStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Conversation>, ChatError> {
        Ok(self.inner.repository.list_conversations(status, limit, offset)?)
    }

    pub fn send_message(&self, chat_id: &ChatId, text: &str) -> Result<SendMessageResponse, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::BadInput("message text must not be empty".to_string()));
        }
        let conversation = self.load_conversation(chat_id)?;
        let now = crate::shared::time::now();
        self.inner
            .repository
            .add_message(chat_id, MessageType::User, text.to_string(), BTreeMap::new())?;

        let outcome = self.contexts.with_context(&conversation, now, |context| {
            context.rebuild_from(&conversation, now);
            self.handlers
                .dispatch(&HandlerInput::Text(text.to_string()), context, &self.classifier, now)
        })?;

        self.apply_outcome(chat_id, outcome, now)
    }

    pub fn upload_file(&self, chat_id: &ChatId, filename: &str, bytes: &[u8]) -> Result<UploadFileResponse, ChatError> {
        sanitize_filename(filename)?;
        let conversation = self.load_conversation(chat_id)?;
        let now = crate::shared::time::now();

        // Pre-sync (spec §9): hydrate before the operation touches files.
        self.contexts
            .with_context(&conversation, now, |context| context.rebuild_from(&conversation, now));

        let saved_path = self
            .inner
            .repository
            .storage()
            .save_uploaded(&conversation.partition_key, chat_id, filename, bytes)?;
        let path_string = saved_path.display().to_string();
        self.inner
            .repository
            .record_file(chat_id, path_string.clone(), FileRole::Uploaded)?;
        self.inner
            .repository
            .add_message(chat_id, MessageType::FileUpload, format!("Uploaded {filename}"), BTreeMap::new())?;

        // Post-sync: the upload just changed persisted file entries.
        let refreshed = self.load_conversation(chat_id)?;
        let current_state = self
            .contexts
            .with_context(&refreshed, now, |context| {
                context.rebuild_from(&refreshed, now);
                context.state
            });

        // Boundary behavior: upload while processing is accepted and
        // recorded, but produces no new proposal (spec §8).
        if current_state == ChatState::Processing {
            return Ok(UploadFileResponse {
                file_path: path_string,
                bot_response: "Got your file. I'll let you know when the current workflow finishes.".to_string(),
                suggested_workflow: None,
            });
        }

        let outcome = self.contexts.with_context(&refreshed, now, |context| {
            self.handlers.dispatch(
                &HandlerInput::FileUploaded {
                    filename: filename.to_string(),
                },
                context,
                &self.classifier,
                now,
            )
        })?;

        match outcome {
            HandlerOutcome::Message {
                content,
                pending_workflow,
                next_state,
            } => {
                self.record_state_and_message(chat_id, &content, pending_workflow.clone(), next_state, now)?;
                Ok(UploadFileResponse {
                    file_path: path_string,
                    bot_response: content,
                    suggested_workflow: pending_workflow,
                })
            }
            HandlerOutcome::ConfirmDecision { .. } => {
                Err(ChatError::BadInput("a file upload cannot answer a confirmation".to_string()))
            }
        }
    }

    pub fn confirm_workflow(
        &self,
        chat_id: &ChatId,
        confirmed: bool,
        modified_steps: Option<JsonValue>,
        run_async: bool,
    ) -> Result<ConfirmOutcome, ChatError> {
        let conversation = self.load_conversation(chat_id)?;
        let now = crate::shared::time::now();

        let pending = self.contexts.with_context(&conversation, now, |context| {
            context.rebuild_from(&conversation, now);
            if context.state != ChatState::AwaitingConfirmation {
                return Err(ChatError::NoPendingWorkflow);
            }
            modified_steps
                .clone()
                .or_else(|| context.pending_workflow.clone())
                .ok_or(ChatError::NoPendingWorkflow)
        })?;

        if !confirmed {
            self.contexts.with_context(&conversation, now, |context| {
                state_machine::transition(&mut context.state, ChatState::Idle)?;
                context.pending_workflow = None;
                Ok::<(), ChatError>(())
            })?;
            let bot_response = "Okay, cancelled. Let me know if you'd like to try something else.".to_string();
            self.inner
                .repository
                .add_message(chat_id, MessageType::System, bot_response.clone(), BTreeMap::new())?;
            return Ok(ConfirmOutcome::Declined { bot_response });
        }

        let steps = self.materialize_steps(chat_id, &pending)?;

        self.contexts.with_context(&conversation, now, |context| {
            state_machine::transition(&mut context.state, ChatState::Processing)?;
            context.pending_workflow = None;
            Ok::<(), ChatError>(())
        })?;
        self.inner.repository.set_status(chat_id, ConversationStatus::Processing, now)?;

        let starting_path = resolve_starting_file(&conversation)?;
        let job_id = generate_job_id(chat_id);
        let partition_key = conversation.partition_key.clone();

        if run_async {
            let inner = Arc::clone(&self.inner);
            let job_chat_id = chat_id.clone();
            self.jobs.submit(job_id.clone(), move || {
                run_workflow(&inner, &job_chat_id, &partition_key, &starting_path, steps)
            })?;
            Ok(ConfirmOutcome::Submitted {
                job_id: job_id.into_inner(),
                status: "submitted",
            })
        } else {
            let bot_response = match run_workflow(&self.inner, chat_id, &partition_key, &starting_path, steps) {
                Ok(summary) => format!(
                    "Workflow completed ({} output file(s)).",
                    summary.get("output_files_count").and_then(JsonValue::as_u64).unwrap_or(0)
                ),
                Err(message) => format!("Workflow failed: {message}"),
            };
            let refreshed = self.load_conversation(chat_id)?;
            Ok(ConfirmOutcome::Completed {
                bot_response,
                output_files: refreshed.output_files,
            })
        }
    }

    fn materialize_steps(&self, chat_id: &ChatId, proposal: &JsonValue) -> Result<Vec<WorkflowStep>, ChatError> {
        let raw_steps = proposal
            .as_array()
            .ok_or_else(|| ChatError::BadInput("workflow proposal must be an array of steps".to_string()))?;

        let mut steps = Vec::with_capacity(raw_steps.len());
        for raw in raw_steps {
            let operation = raw
                .get("operation")
                .and_then(JsonValue::as_str)
                .ok_or_else(|| ChatError::BadInput("workflow step is missing `operation`".to_string()))?;
            let arguments: BTreeMap<String, JsonValue> = raw
                .get("arguments")
                .and_then(JsonValue::as_object)
                .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default();

            let entry = self.inner.registry.get(operation)?;
            entry.arg_schema.validate(operation, &arguments)?;

            let step = self.inner.repository.add_workflow_step(chat_id, operation.to_string(), arguments)?;
            steps.push(step);
        }
        Ok(steps)
    }

    fn apply_outcome(&self, chat_id: &ChatId, outcome: HandlerOutcome, now: DateTime<Utc>) -> Result<SendMessageResponse, ChatError> {
        match outcome {
            HandlerOutcome::Message {
                content,
                pending_workflow,
                next_state,
            } => {
                let requires_file = matches!(next_state, Some(ChatState::AwaitingFile));
                let requires_confirmation = pending_workflow.is_some();
                self.record_state_and_message(chat_id, &content, pending_workflow.clone(), next_state, now)?;
                Ok(SendMessageResponse {
                    bot_response: content,
                    suggested_workflow: pending_workflow,
                    requires_confirmation,
                    requires_file,
                })
            }
            HandlerOutcome::ConfirmDecision { confirmed } => {
                let outcome = self.confirm_workflow(chat_id, confirmed, None, true)?;
                let bot_response = match &outcome {
                    ConfirmOutcome::Submitted { job_id, .. } => format!("Submitted job {job_id}."),
                    ConfirmOutcome::Declined { bot_response } => bot_response.clone(),
                    ConfirmOutcome::Completed { bot_response, .. } => bot_response.clone(),
                };
                Ok(SendMessageResponse {
                    bot_response,
                    suggested_workflow: None,
                    requires_confirmation: false,
                    requires_file: false,
                })
            }
        }
    }

    fn record_state_and_message(
        &self,
        chat_id: &ChatId,
        content: &str,
        pending_workflow: Option<JsonValue>,
        next_state: Option<ChatState>,
        now: DateTime<Utc>,
    ) -> Result<(), ChatError> {
        let conversation = self.load_conversation(chat_id)?;
        self.contexts.with_context(&conversation, now, |context| {
            if let Some(next) = next_state {
                state_machine::transition(&mut context.state, next)?;
                if next == ChatState::Idle {
                    context.pending_workflow = None;
                }
            }
            if let Some(ref workflow) = pending_workflow {
                context.pending_workflow = Some(workflow.clone());
            }
            Ok::<(), ChatError>(())
        })?;

        let metadata = match &pending_workflow {
            Some(workflow) => pending_workflow_metadata(workflow),
            None => BTreeMap::new(),
        };
        self.inner
            .repository
            .add_message(chat_id, MessageType::System, content.to_string(), metadata)?;
        Ok(())
    }

    pub fn get_job_status(&self, job_id: &str) -> Result<BackgroundJob, ChatError> {
        let job_id = JobId::parse(job_id).map_err(ChatError::BadInput)?;
        self.jobs
            .get_status(&job_id)
            .ok_or_else(|| ChatError::JobNotFound(job_id.into_inner()))
    }

    pub fn get_history(&self, chat_id: &ChatId, limit: Option<usize>) -> Result<Conversation, ChatError> {
        let mut conversation = self.load_conversation(chat_id)?;
        if let Some(limit) = limit {
            if conversation.messages.len() > limit {
                let start = conversation.messages.len() - limit;
                conversation.messages = conversation.messages.split_off(start);
            }
        }
        Ok(conversation)
    }

    pub fn delete_conversation(&self, chat_id: &ChatId) -> Result<(), ChatError> {
        self.inner.repository.delete_conversation(chat_id)?;
        self.contexts.remove(chat_id);
        Ok(())
    }

    pub fn download_file(&self, chat_id: &ChatId, filename: &str) -> Result<Vec<u8>, ChatError> {
        sanitize_filename(filename)?;
        let conversation = self.load_conversation(chat_id)?;
        let storage = self.inner.repository.storage();
        let dir = storage.conversation_dir(&conversation.partition_key, chat_id);

        let uploads_candidate = dir.join("uploads").join(filename);
        if let Ok(bytes) = storage.read(&conversation.partition_key, chat_id, &uploads_candidate) {
            return Ok(bytes);
        }
        let outputs_candidate = dir.join("outputs").join(filename);
        Ok(storage.read(&conversation.partition_key, chat_id, &outputs_candidate)?)
    }

    pub fn operations_catalog(&self) -> HashMap<String, Vec<String>> {
        self.inner.registry.grouped_catalog()
    }

    pub fn dump_conversation(&self, chat_id: &ChatId) -> Result<PathBuf, ChatError> {
        Ok(self.inner.repository.dump(chat_id)?)
    }

    pub fn restore_conversation(&self, archive_bytes: &[u8]) -> Result<Conversation, ChatError> {
        Ok(self.inner.repository.restore(archive_bytes)?)
    }

    pub fn snapshot_persistence(&self, snapshots_dir: &Path) -> Result<PathBuf, ChatError> {
        Ok(self.inner.repository.snapshot_persistence(snapshots_dir)?)
    }

    pub fn cleanup_jobs(&self, max_age: Duration) -> usize {
        self.jobs.cleanup(max_age)
    }

    pub fn evict_idle_contexts(&self, idle_ttl: Duration) -> usize {
        self.contexts.evict_idle(crate::shared::time::now(), idle_ttl)
    }
}

fn pending_workflow_metadata(workflow: &JsonValue) -> BTreeMap<String, JsonValue> {
    let mut metadata = BTreeMap::new();
    metadata.insert("pending_workflow".to_string(), workflow.clone());
    metadata.insert("requires_confirmation".to_string(), JsonValue::Bool(true));
    metadata
}

fn resolve_starting_file(conversation: &Conversation) -> Result<PathBuf, ChatError> {
    conversation
        .uploaded_files
        .last()
        .map(PathBuf::from)
        .ok_or_else(|| ChatError::BadInput("no uploaded file to run the workflow against".to_string()))
}

/// Runs the Workflow Executor and folds its outcome back into the
/// Conversation's persisted status; this doubles as the job's
/// `on_complete` hook since `JobManager` only tracks a job's `Result`,
/// not a separate callback.
fn run_workflow(
    inner: &ChatServiceInner,
    chat_id: &ChatId,
    partition_key: &str,
    starting_path: &Path,
    steps: Vec<WorkflowStep>,
) -> Result<JsonValue, String> {
    let publish = |event: ServerEvent| {
        let _ = bridge::publish(event);
    };
    let executor = WorkflowExecutor::new(&inner.registry, inner.repository.storage(), &inner.repository, inner.step_timeout);
    let result = executor.run(chat_id, partition_key, starting_path, steps, &publish);
    let now = crate::shared::time::now();
    match result {
        Ok(summary) => {
            let _ = inner.repository.set_status(chat_id, ConversationStatus::Completed, now);
            Ok(serde_json::json!({
                "total_steps": summary.total_steps,
                "output_files_count": summary.output_files_count,
            }))
        }
        Err(err) => {
            let _ = inner.repository.set_status(chat_id, ConversationStatus::Failed, now);
            Err(err.to_string())
        }
    }
}
