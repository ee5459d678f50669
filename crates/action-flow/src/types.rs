//! Task definitions and run results

use action_primitives::Action;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// A named unit of automation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Task name
    pub name: String,

    /// Task description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Node to navigate to; without one only `steps` run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Post-arrival sequence
    #[serde(default)]
    pub steps: Vec<TaskStep>,

    /// Bound on capture, recognition and re-planning attempts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    /// Per-step acknowledgment timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_timeout_ms: Option<u64>,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            target: None,
            steps: Vec::new(),
            max_retries: None,
            step_timeout_ms: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_step(mut self, step: TaskStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }
}

/// One action of the post-arrival sequence, with its execution options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStep {
    pub action: Action,

    /// Pause before the step starts
    #[serde(default)]
    pub delay_ms: u64,

    /// Extra attempts after a recoverable failure; `None` runs once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<u32>,

    /// Extra runs after a success; stops at the first failure
    #[serde(default)]
    pub repeat: u32,

    /// Continue the sequence when this step fails
    #[serde(default)]
    pub skip_if_failed: bool,
}

impl TaskStep {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            delay_ms: 0,
            retry: None,
            repeat: 0,
            skip_if_failed: false,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_repeat(mut self, repeat: u32) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn skip_if_failed(mut self) -> Self {
        self.skip_if_failed = true;
        self
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Why a run ended without success
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbortReason {
    /// Recognition stayed unknown or ambiguous past the retry bound
    #[error("Unresolvable state after {attempts} attempts")]
    UnresolvableState { attempts: u32 },

    /// No path from the current node to the target
    #[error("Target {to} unreachable from {from}")]
    TargetUnreachable { from: String, to: String },

    /// An action kept failing after retries and re-planning
    #[error("Action {action} failed: {reason}")]
    ActionFailed { action: String, reason: String },

    /// Device connection lost
    #[error("Device lost: {reason}")]
    DeviceLost { reason: String },

    #[error("Cancelled")]
    Cancelled,

    /// Run exceeded its total time ceiling
    #[error("Task deadline exceeded after {elapsed_ms}ms")]
    DeadlineExceeded { elapsed_ms: u64 },
}

impl AbortReason {
    /// Structural failures cannot be fixed by running the task again unchanged
    pub fn is_structural(&self) -> bool {
        matches!(self, AbortReason::TargetUnreachable { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AbortReason::UnresolvableState { .. } => "unresolvable_state",
            AbortReason::TargetUnreachable { .. } => "target_unreachable",
            AbortReason::ActionFailed { .. } => "action_failed",
            AbortReason::DeviceLost { .. } => "device_lost",
            AbortReason::Cancelled => "cancelled",
            AbortReason::DeadlineExceeded { .. } => "deadline_exceeded",
        }
    }
}

/// Terminal result of one run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success(RunReport),
    Aborted {
        reason: AbortReason,
        report: RunReport,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn report(&self) -> &RunReport {
        match self {
            Outcome::Success(report) => report,
            Outcome::Aborted { report, .. } => report,
        }
    }

    pub fn abort_reason(&self) -> Option<&AbortReason> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Aborted { reason, .. } => Some(reason),
        }
    }
}

/// Run statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Task name
    pub task: String,

    /// Session identifier
    pub session_id: String,

    /// Overall success
    pub success: bool,

    /// Start time
    pub started_at: DateTime<Utc>,

    /// Finish time
    pub finished_at: DateTime<Utc>,

    /// Total latency in milliseconds
    pub latency_ms: u64,

    /// Actions acknowledged by the device
    pub actions_executed: u32,

    /// Actions that returned an error
    pub actions_failed: u32,

    /// Screen captures requested
    pub capture_attempts: u32,

    /// Retries of any kind
    pub retries: u32,

    /// Nodes resolved along the way, in order
    pub visited: Vec<String>,

    /// Trailing step results
    pub steps: Vec<StepResult>,

    /// Error message if failed
    pub error: Option<String>,
}

impl RunReport {
    /// Create a new run report
    pub fn new(task: String, session_id: String) -> Self {
        let now = Utc::now();
        Self {
            task,
            session_id,
            success: false,
            started_at: now,
            finished_at: now,
            latency_ms: 0,
            actions_executed: 0,
            actions_failed: 0,
            capture_attempts: 0,
            retries: 0,
            visited: Vec::new(),
            steps: Vec::new(),
            error: None,
        }
    }

    /// Mark as success
    pub fn with_success(mut self) -> Self {
        self.success = true;
        self
    }

    /// Mark as failure
    pub fn with_error(mut self, error: String) -> Self {
        self.success = false;
        self.error = Some(error);
        self
    }

    /// Record a resolved node, collapsing repeats
    pub fn visit(&mut self, node: &str) {
        if self.visited.last().map(String::as_str) != Some(node) {
            self.visited.push(node.to_string());
        }
    }

    /// Set finish time and calculate latency
    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self.latency_ms = (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64;
        self
    }
}

/// Result of one trailing step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Position in the task's step list
    pub index: usize,

    /// Action kind
    pub action: String,

    /// Success flag
    pub success: bool,

    /// Executions including retries and repeats
    pub attempts: u32,

    /// Start time
    pub started_at: DateTime<Utc>,

    /// Latency in milliseconds
    pub latency_ms: u64,

    /// Error message (if failed)
    pub error: Option<String>,
}

impl StepResult {
    /// Create a new step result
    pub fn new(index: usize, action: &Action) -> Self {
        Self {
            index,
            action: action.kind().to_string(),
            success: false,
            attempts: 0,
            started_at: Utc::now(),
            latency_ms: 0,
            error: None,
        }
    }

    /// Mark as success
    pub fn with_success(mut self) -> Self {
        self.success = true;
        self
    }

    /// Mark as failure
    pub fn with_error(mut self, error: String) -> Self {
        self.success = false;
        self.error = Some(error);
        self
    }

    /// Set latency from start time
    pub fn finish(mut self) -> Self {
        self.latency_ms = (Utc::now() - self.started_at).num_milliseconds().max(0) as u64;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_primitives::Key;

    #[test]
    fn test_task_builder() {
        let task = Task::new("daily")
            .with_target("home")
            .with_step(
                TaskStep::new(Action::KeyPress { key: Key::Back })
                    .with_retry(2)
                    .skip_if_failed(),
            )
            .with_max_retries(5);

        assert_eq!(task.target.as_deref(), Some("home"));
        assert_eq!(task.steps.len(), 1);
        assert_eq!(task.steps[0].retry, Some(2));
        assert!(task.steps[0].skip_if_failed);
    }

    #[test]
    fn test_report_visits_collapse_repeats() {
        let mut report = RunReport::new("t".into(), "s".into());
        report.visit("a");
        report.visit("a");
        report.visit("b");
        report.visit("a");
        assert_eq!(report.visited, vec!["a", "b", "a"]);
    }

    #[test]
    fn test_outcome_serializes_with_status() {
        let outcome = Outcome::Aborted {
            reason: AbortReason::Cancelled,
            report: RunReport::new("t".into(), "s".into()).finish(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "aborted");
        assert_eq!(json["reason"]["kind"], "cancelled");
        assert!(!outcome.is_success());
    }
}
