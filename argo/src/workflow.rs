//! Workflow entry definitions
//!
//! Defines the `WorkflowEntry` registry record and its lifecycle states.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a workflow entry as tracked by the registry.
///
/// ```text
/// pending --start--> running --success--> completed
///                       |
///                       |--failure----> failed
///                       |--abandon----> abandoned
///                       `--pause------> paused --resume--> running
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowState {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Abandoned,
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Abandoned => "abandoned",
        }
    }

    /// True for completed/failed/abandoned — states the registry will prune.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Abandoned)
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unknown state strings load as `pending` per the registry persistence
/// contract (spec.md §6).
impl From<&str> for WorkflowState {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "abandoned" => Self::Abandoned,
            _ => Self::Pending,
        }
    }
}

/// A durable registry record tracking one workflow's execution across
/// daemon restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEntry {
    /// Unique workflow identifier, e.g. `"deploy_03"`.
    pub id: String,
    /// Workflow template name, e.g. `"deploy"`.
    pub name: String,
    /// Current lifecycle state.
    pub state: WorkflowState,
    /// Executor process id; 0 when no executor has been spawned yet.
    pub pid: u32,
    /// Epoch seconds when the entry transitioned to `running`.
    pub start_time: Option<i64>,
    /// Epoch seconds when the entry transitioned to a terminal state.
    pub end_time: Option<i64>,
    /// Executor process exit code, once observed.
    pub exit_code: Option<i32>,
    /// Set when `DELETE /api/workflow/abandon/{id}` has been issued.
    pub abandon_requested: bool,
    /// 1-based index of the step currently executing.
    pub current_step: u64,
    /// Total number of steps in the workflow graph.
    pub total_steps: u64,
    /// Timeout in seconds for the whole run (0 = no timeout).
    pub timeout_secs: u64,
    /// Number of retries attempted so far, across all steps.
    pub retry_count: u32,
    /// Maximum retries permitted (informational; steps carry their own).
    pub max_retries: u32,
    /// Epoch seconds of the most recent retry, if any.
    pub last_retry_time: Option<i64>,
}

impl WorkflowEntry {
    /// Create a new `pending` entry for a freshly-allocated workflow id.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            state: WorkflowState::Pending,
            pid: 0,
            start_time: None,
            end_time: None,
            exit_code: None,
            abandon_requested: false,
            current_step: 0,
            total_steps: 0,
            timeout_secs: 0,
            retry_count: 0,
            max_retries: 0,
            last_retry_time: None,
        }
    }

    /// Transition to `running`, recording the executor pid and start time.
    pub fn mark_running(&mut self, pid: u32, now: i64) {
        self.state = WorkflowState::Running;
        self.pid = pid;
        self.start_time = Some(now);
    }

    /// Transition to a new state; terminal states set `end_time`.
    ///
    /// This is the one place §3's invariant ("state transitions from
    /// non-terminal to terminal set end time") is enforced.
    pub fn transition(&mut self, new_state: WorkflowState, now: i64) {
        self.state = new_state;
        if new_state.is_terminal() && self.end_time.is_none() {
            self.end_time = Some(now);
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
