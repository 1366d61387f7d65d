//! Response bodies for the REST surface (spec §6). Each wraps the
//! relevant domain/chat type without re-deriving its shape, matching the
//! teacher's `SlackMessage`/`ConversationSummary` wire structs that carry
//! a subset of fields straight through from an inner type.

use crate::chat::{ConfirmOutcome, SendMessageResponse, UploadFileResponse as ChatUploadFileResponse};
use crate::domain::{Conversation, Message};
use crate::domain::job::BackgroundJob;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
pub struct ConversationResponse {
    pub chat_id: String,
    pub participant_name: String,
    pub status: String,
    pub partition_key: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub messages: Vec<Message>,
    pub uploaded_files: Vec<String>,
    pub output_files: Vec<String>,
}

impl From<Conversation> for ConversationResponse {
    fn from(conversation: Conversation) -> Self {
        Self {
            chat_id: conversation.chat_id.into_inner(),
            participant_name: conversation.participant_name,
            status: conversation.status.as_str().to_string(),
            partition_key: conversation.partition_key,
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
            messages: conversation.messages,
            uploaded_files: conversation.uploaded_files,
            output_files: conversation.output_files,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummaryResponse {
    pub chat_id: String,
    pub participant_name: String,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Conversation> for ConversationSummaryResponse {
    fn from(conversation: Conversation) -> Self {
        Self {
            chat_id: conversation.chat_id.into_inner(),
            participant_name: conversation.participant_name,
            status: conversation.status.as_str().to_string(),
            created_at: conversation.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SendMessageResponseBody {
    pub bot_response: String,
    pub suggested_workflow: Option<JsonValue>,
    pub requires_confirmation: bool,
    pub requires_file: bool,
}

impl From<SendMessageResponse> for SendMessageResponseBody {
    fn from(response: SendMessageResponse) -> Self {
        Self {
            bot_response: response.bot_response,
            suggested_workflow: response.suggested_workflow,
            requires_confirmation: response.requires_confirmation,
            requires_file: response.requires_file,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadFileResponseBody {
    pub file_path: String,
    pub bot_response: String,
    pub suggested_workflow: Option<JsonValue>,
}

impl From<ChatUploadFileResponse> for UploadFileResponseBody {
    fn from(response: ChatUploadFileResponse) -> Self {
        Self {
            file_path: response.file_path,
            bot_response: response.bot_response,
            suggested_workflow: response.suggested_workflow,
        }
    }
}

/// One of three shapes depending on the confirm decision, matching the
/// REST table's "202 with `{job_id, status}`; 200 when declined" split —
/// `status_code` lives on the surrounding `ApiEnvelope`, not here.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ConfirmWorkflowResponseBody {
    Submitted {
        job_id: String,
        status: &'static str,
    },
    Settled {
        bot_response: String,
        output_files: Vec<String>,
    },
}

impl From<ConfirmOutcome> for ConfirmWorkflowResponseBody {
    fn from(outcome: ConfirmOutcome) -> Self {
        match outcome {
            ConfirmOutcome::Submitted { job_id, status } => {
                ConfirmWorkflowResponseBody::Submitted { job_id, status }
            }
            ConfirmOutcome::Declined { bot_response } => ConfirmWorkflowResponseBody::Settled {
                bot_response,
                output_files: Vec::new(),
            },
            ConfirmOutcome::Completed {
                bot_response,
                output_files,
            } => ConfirmWorkflowResponseBody::Settled {
                bot_response,
                output_files,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatusResponseBody {
    pub job_id: String,
    pub status: String,
    pub result: Option<JsonValue>,
    pub error: Option<String>,
}

impl From<BackgroundJob> for JobStatusResponseBody {
    fn from(job: BackgroundJob) -> Self {
        Self {
            job_id: job.job_id.into_inner(),
            status: job.status.as_str().to_string(),
            result: job.result,
            error: job.error,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponseBody {
    pub chat_id: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DumpResponseBody {
    pub dump_file: String,
    pub download_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationsCatalogResponseBody {
    pub operations: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SqliteBackupResponseBody {
    pub snapshot_path: String,
}
