//! Request bodies for the REST surface (spec §6). Multipart-carried
//! bytes (`upload`, `restore`) are not modeled here — an external HTTP
//! layer decodes the multipart envelope and hands the Chat Service raw
//! bytes directly; only the JSON-carried fields get a type.

use serde::Deserialize;
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmWorkflowRequest {
    pub confirmed: bool,
    #[serde(default)]
    pub modified_workflow: Option<JsonValue>,
    /// Defaults to `true` per spec §9 ("fixes the default at `true` for
    /// the confirm endpoint and requires explicit opt-out").
    #[serde(default = "default_run_async")]
    pub run_async: bool,
}

fn default_run_async() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListConversationsQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}
