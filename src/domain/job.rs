use crate::shared::ids::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Position in the monotone DAG `pending < running < terminal` used by
    /// the spec's job-status monotonicity law (§8).
    fn rank(&self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Running => 1,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => 2,
        }
    }

    pub fn can_advance_to(&self, next: JobStatus) -> bool {
        next.rank() >= self.rank() && !self.is_terminal()
    }
}

/// In-memory-only record of a background workflow run (spec §3
/// BackgroundJob). Never persisted; lost on process restart by design.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundJob {
    pub job_id: JobId,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<JsonValue>,
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("illegal job status transition from {from:?} to {to:?}")]
pub struct JobTransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

impl BackgroundJob {
    pub fn new_pending(job_id: JobId, submitted_at: DateTime<Utc>) -> Self {
        Self {
            job_id,
            status: JobStatus::Pending,
            submitted_at,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), JobTransitionError> {
        self.transition(JobStatus::Running)?;
        self.started_at = Some(now);
        Ok(())
    }

    pub fn complete(&mut self, result: JsonValue, now: DateTime<Utc>) -> Result<(), JobTransitionError> {
        self.transition(JobStatus::Completed)?;
        self.result = Some(result);
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn fail(&mut self, error: String, now: DateTime<Utc>) -> Result<(), JobTransitionError> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error);
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), JobTransitionError> {
        self.transition(JobStatus::Cancelled)?;
        self.completed_at = Some(now);
        Ok(())
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), JobTransitionError> {
        if !self.status.can_advance_to(next) {
            return Err(JobTransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::ids::ChatId;

    #[test]
    fn status_rank_is_monotone() {
        assert!(JobStatus::Pending.can_advance_to(JobStatus::Running));
        assert!(JobStatus::Running.can_advance_to(JobStatus::Completed));
        assert!(!JobStatus::Completed.can_advance_to(JobStatus::Running));
        assert!(!JobStatus::Failed.can_advance_to(JobStatus::Completed));
    }

    #[test]
    fn cannot_complete_without_running_first_is_still_allowed_by_rank_but_not_by_flow() {
        let chat_id = ChatId::new_random();
        let job_id = crate::shared::ids::generate_job_id(&chat_id);
        let mut job = BackgroundJob::new_pending(job_id, Utc::now());
        // rank allows pending -> completed; real callers always go through start() first.
        assert!(job.complete(serde_json::json!({}), Utc::now()).is_ok());
        assert!(job.status.is_terminal());
    }

    #[test]
    fn terminal_jobs_reject_further_transitions() {
        let chat_id = ChatId::new_random();
        let job_id = crate::shared::ids::generate_job_id(&chat_id);
        let mut job = BackgroundJob::new_pending(job_id, Utc::now());
        job.fail("boom".to_string(), Utc::now()).expect("fail");
        let err = job
            .start(Utc::now())
            .expect_err("terminal job cannot restart");
        assert_eq!(err.from, JobStatus::Failed);
    }
}
