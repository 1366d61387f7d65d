//! The envelope every REST response shares (spec §6: `{data, message,
//! meta:{api_version, request_id, requested_time}, status_code}`).

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const API_VERSION: &str = "v1";

#[derive(Debug, Clone, Serialize)]
pub struct EnvelopeMeta {
    pub api_version: &'static str,
    pub request_id: String,
    pub requested_time: DateTime<Utc>,
}

impl EnvelopeMeta {
    pub fn new(request_id: String, requested_time: DateTime<Utc>) -> Self {
        Self {
            api_version: API_VERSION,
            request_id,
            requested_time,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiEnvelope<T> {
    pub data: T,
    pub message: String,
    pub meta: EnvelopeMeta,
    pub status_code: u16,
}

impl<T> ApiEnvelope<T> {
    pub fn new(data: T, message: impl Into<String>, status_code: u16, meta: EnvelopeMeta) -> Self {
        Self {
            data,
            message: message.into(),
            meta,
            status_code,
        }
    }

    pub fn ok(data: T, meta: EnvelopeMeta) -> Self {
        Self::new(data, "ok", 200, meta)
    }

    pub fn created(data: T, meta: EnvelopeMeta) -> Self {
        Self::new(data, "created", 201, meta)
    }

    pub fn accepted(data: T, meta: EnvelopeMeta) -> Self {
        Self::new(data, "accepted", 202, meta)
    }
}
