//! Phases and execution step records

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::{AutopilotError, Result};

/// One stage of the fixed four-phase plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Planning,
    ResourceGathering,
    Execution,
    Validation,
}

impl Phase {
    /// Plan order
    pub const ALL: [Phase; 4] = [
        Phase::Planning,
        Phase::ResourceGathering,
        Phase::Execution,
        Phase::Validation,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Phase::Planning => "Planning",
            Phase::ResourceGathering => "Resource Gathering",
            Phase::Execution => "Execution",
            Phase::Validation => "Validation",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Error,
}

impl StepStatus {
    pub fn can_transition_to(self, next: StepStatus) -> bool {
        matches!(
            (self, next),
            (StepStatus::Pending, StepStatus::Running)
                | (StepStatus::Running, StepStatus::Completed)
                | (StepStatus::Running, StepStatus::Error)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Error)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// A phase record, mutated in place as the runner advances
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStep {
    pub id: Uuid,
    pub phase: Phase,
    pub agent: String,
    pub action: String,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl ExecutionStep {
    pub fn new(phase: Phase, agent: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            phase,
            agent: agent.into(),
            action: action.into(),
            status: StepStatus::Pending,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    fn transition(&mut self, next: StepStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(AutopilotError::InvalidStepTransition {
                step: self.phase.label().to_string(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        self.transition(StepStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn complete(&mut self, result: serde_json::Value) -> Result<()> {
        self.transition(StepStatus::Completed)?;
        self.completed_at = Some(Utc::now());
        self.result = Some(result);
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        self.transition(StepStatus::Error)?;
        self.completed_at = Some(Utc::now());
        self.error = Some(error.into());
        Ok(())
    }

    pub fn duration_ms(&self) -> Option<u64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds().max(0) as u64),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        let mut step = ExecutionStep::new(Phase::Planning, "Strategy Planner", "Plan");
        assert_eq!(step.status, StepStatus::Pending);

        step.start().unwrap();
        assert_eq!(step.status, StepStatus::Running);
        assert!(step.started_at.is_some());

        step.complete(serde_json::json!({"ok": true})).unwrap();
        assert_eq!(step.status, StepStatus::Completed);
        assert!(step.completed_at.is_some());
        assert!(step.duration_ms().is_some());
    }

    #[test]
    fn test_no_regression_after_completion() {
        let mut step = ExecutionStep::new(Phase::Execution, "Agent", "Run");
        step.start().unwrap();
        step.complete(serde_json::json!(null)).unwrap();

        let err = step.start().unwrap_err();
        assert!(matches!(err, AutopilotError::InvalidStepTransition { .. }));
        assert_eq!(step.status, StepStatus::Completed);
    }

    #[test]
    fn test_cannot_complete_pending_step() {
        let mut step = ExecutionStep::new(Phase::Validation, "Quality Validator", "Check");
        assert!(step.complete(serde_json::json!({})).is_err());
        assert!(step.fail("boom").is_err());
        assert_eq!(step.status, StepStatus::Pending);
        assert!(step.result.is_none());
    }

    #[test]
    fn test_fail_records_error() {
        let mut step = ExecutionStep::new(Phase::ResourceGathering, "Resource Coordinator", "Gather");
        step.start().unwrap();
        step.fail("connector offline").unwrap();
        assert_eq!(step.status, StepStatus::Error);
        assert_eq!(step.error.as_deref(), Some("connector offline"));
        assert!(step.status.is_terminal());
    }

    #[test]
    fn test_phase_order() {
        let labels: Vec<_> = Phase::ALL.iter().map(|p| p.label()).collect();
        assert_eq!(
            labels,
            vec!["Planning", "Resource Gathering", "Execution", "Validation"]
        );
    }
}
