use crate::shared::ids::{ChatId, StepId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(StepStatus::Pending),
            "running" => Some(StepStatus::Running),
            "completed" => Some(StepStatus::Completed),
            "failed" => Some(StepStatus::Failed),
            _ => None,
        }
    }

    fn can_transition_to(self, next: StepStatus) -> bool {
        matches!(
            (self, next),
            (StepStatus::Pending, StepStatus::Running)
                | (StepStatus::Running, StepStatus::Completed)
                | (StepStatus::Running, StepStatus::Failed)
        )
    }
}

/// One operation invocation within a workflow, enforcing the step
/// invariants from the data model: `progress` stays in `[0, 100]`,
/// `completed` implies `progress == 100` and `completed_at` is set,
/// `failed` implies `error_message` and `completed_at` are set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub step_id: StepId,
    pub chat_id: ChatId,
    pub operation: String,
    pub arguments: BTreeMap<String, JsonValue>,
    pub input_file: Option<String>,
    pub output_file: Option<String>,
    pub status: StepStatus,
    pub progress: u8,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum StepTransitionError {
    #[error("illegal workflow step transition from {from:?} to {to:?}")]
    Illegal { from: StepStatus, to: StepStatus },
}

impl WorkflowStep {
    pub fn new_pending(
        chat_id: ChatId,
        operation: String,
        arguments: BTreeMap<String, JsonValue>,
    ) -> Self {
        Self {
            step_id: StepId::new_random(),
            chat_id,
            operation,
            arguments,
            input_file: None,
            output_file: None,
            status: StepStatus::Pending,
            progress: 0,
            error_message: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), StepTransitionError> {
        self.transition(StepStatus::Running)?;
        self.started_at = Some(now);
        Ok(())
    }

    pub fn set_progress(&mut self, progress: u8) {
        self.progress = progress.min(100);
    }

    pub fn complete(&mut self, output_file: Option<String>, now: DateTime<Utc>) -> Result<(), StepTransitionError> {
        self.transition(StepStatus::Completed)?;
        self.output_file = output_file;
        self.progress = 100;
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn fail(&mut self, error_message: String, now: DateTime<Utc>) -> Result<(), StepTransitionError> {
        self.transition(StepStatus::Failed)?;
        self.error_message = Some(error_message);
        self.completed_at = Some(now);
        Ok(())
    }

    fn transition(&mut self, next: StepStatus) -> Result<(), StepTransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(StepTransitionError::Illegal {
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

    fn sample_step() -> WorkflowStep {
        WorkflowStep::new_pending(
            ChatId::new_random(),
            "excel/extract-columns-to-file".to_string(),
            BTreeMap::new(),
        )
    }

    #[test]
    fn completing_sets_progress_to_100_and_completed_at() {
        let mut step = sample_step();
        let now = Utc::now();
        step.start(now).expect("start");
        step.complete(Some("outputs/out.xlsx".to_string()), now)
            .expect("complete");
        assert_eq!(step.progress, 100);
        assert!(step.completed_at.is_some());
    }

    #[test]
    fn failing_requires_error_message() {
        let mut step = sample_step();
        let now = Utc::now();
        step.start(now).expect("start");
        step.fail("bad column".to_string(), now).expect("fail");
        assert_eq!(step.error_message.as_deref(), Some("bad column"));
        assert!(step.completed_at.is_some());
    }

    #[test]
    fn cannot_complete_a_pending_step_directly() {
        let mut step = sample_step();
        let err = step
            .complete(None, Utc::now())
            .expect_err("should reject pending->completed");
        assert!(matches!(err, StepTransitionError::Illegal { .. }));
    }

    #[test]
    fn cannot_restart_a_completed_step() {
        let mut step = sample_step();
        let now = Utc::now();
        step.start(now).expect("start");
        step.complete(None, now).expect("complete");
        let err = step.start(now).expect_err("should reject re-start");
        assert!(matches!(err, StepTransitionError::Illegal { .. }));
    }
}
