//! Newline-delimited JSON logging.
//!
//! Grounded in the teacher's `shared::logging::append_orchestrator_log_line`:
//! no external logging framework sits in the dependency graph, so each log
//! line is a hand-assembled JSON object appended to a configured file.

use crate::shared::ids::unix_millis_now;
use serde_json::json;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn server_log_path(base_dir: &Path) -> PathBuf {
    base_dir.join("logs/server.log")
}

/// Appends one structured log line. `request_id` correlates a line back to
/// the HTTP request that triggered an unexpected 500 (spec §7).
pub fn append_log_line(
    log_path: &Path,
    level: &str,
    event: &str,
    request_id: Option<&str>,
    fields: serde_json::Value,
) -> std::io::Result<()> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let record = json!({
        "ts_ms": unix_millis_now(),
        "level": level,
        "event": event,
        "request_id": request_id,
        "fields": fields,
    });
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;
    writeln!(file, "{record}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn appends_parseable_json_lines() {
        let dir = tempdir().expect("tempdir");
        let path = server_log_path(dir.path());
        append_log_line(&path, "info", "job_submitted", Some("req-1"), json!({"job_id": "j1"}))
            .expect("append");
        append_log_line(&path, "error", "job_failed", None, json!({"job_id": "j1"})).expect("append");

        let contents = fs::read_to_string(&path).expect("read log");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).expect("valid json");
        assert_eq!(first["event"], "job_submitted");
        assert_eq!(first["request_id"], "req-1");
    }
}
