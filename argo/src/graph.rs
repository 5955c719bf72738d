//! Workflow graph model
//!
//! JSON-defined step graphs: phases, steps, transitions, retry and
//! error-handling policy. Deserialized directly from the workflow template
//! files the daemon loads by name (spec.md §3, §6).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Step ids are unique within a workflow; `next_step`/`if_true`/`if_false`/
/// option `next_step` fields reference them directly (spec.md §3).
pub type StepId = u64;

/// `next_step` is either a step id, or the literal `"EXIT"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NextStep {
    Index(StepId),
    Exit,
}

impl NextStep {
    pub fn is_exit(&self) -> bool {
        matches!(self, Self::Exit)
    }
}

/// Parse an `on_error` step reference, given either as a bare numeric
/// string or the literal `"EXIT"` (spec.md §4.2's `on_error` contract).
pub fn parse_step_ref(raw: &str) -> crate::error::Result<NextStep> {
    if raw == "EXIT" {
        return Ok(NextStep::Exit);
    }
    raw.parse::<StepId>()
        .map(NextStep::Index)
        .map_err(|_| crate::error::ArgoError::ProtocolFormat(format!("invalid step reference {:?}", raw)))
}

/// Backoff policy for a step's retry wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    Fixed,
    Linear,
    Exponential,
}

impl Default for BackoffKind {
    fn default() -> Self {
        Self::Fixed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub backoff: BackoffKind,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff: BackoffKind::Fixed,
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// What action to take when a step fails after exhausting retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorAction {
    Skip,
    Goto,
    Fail,
}

/// A step's `on_error` field, either a bare step reference (shorthand for
/// `goto`) or a structured `{action, target?}` object (spec.md §4.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorPolicy {
    Goto(String),
    Structured {
        action: ErrorAction,
        #[serde(default)]
        target: Option<String>,
    },
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        ErrorPolicy::Structured {
            action: ErrorAction::Fail,
            target: None,
        }
    }
}

/// One option in a `user_choose` menu.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub label: String,
    pub value: String,
    pub next_step: NextStep,
}

/// One question in a `ci_ask_series` step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub question: String,
}

/// The tagged-variant step payload. Each variant corresponds to one entry
/// in spec.md §4.2's step-type table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    UserAsk {
        prompt: String,
        save_to: String,
    },
    Display {
        message: String,
    },
    SaveFile {
        destination: String,
        data: serde_json::Value,
    },
    Decide {
        condition: String,
        if_true: NextStep,
        if_false: NextStep,
    },
    UserChoose {
        prompt: String,
        options: Vec<ChoiceOption>,
    },
    CiAsk {
        #[serde(default)]
        persona: Option<String>,
        prompt_template: String,
        save_to: String,
    },
    CiAnalyze {
        #[serde(default)]
        persona: Option<String>,
        task: String,
        save_to: String,
    },
    CiAskSeries {
        #[serde(default)]
        persona: Option<String>,
        #[serde(default)]
        intro: Option<String>,
        questions: Vec<Question>,
        save_to: String,
    },
    CiPresent {
        #[serde(default)]
        persona: Option<String>,
        data: String,
        #[serde(default)]
        format: Option<String>,
    },
    WorkflowCall {
        workflow: String,
        #[serde(default)]
        input: HashMap<String, String>,
        save_to: String,
    },
    Parallel {
        parallel_steps: Vec<StepId>,
    },
}

/// One node in the step graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    #[serde(rename = "step")]
    pub id: StepId,
    #[serde(flatten)]
    pub kind: StepKind,
    pub next_step: NextStep,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub on_error: ErrorPolicy,
    /// Maximum times a backward edge out of this step may be taken before
    /// `ArgoError::MaxIterations` is raised.
    #[serde(default)]
    pub max_iterations: Option<u32>,
}

/// A named group of steps (spec.md §3: "an ordered collection of phases;
/// each phase carries an ordered collection of steps").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Phase {
    #[serde(default)]
    pub name: String,
    pub steps: Vec<Step>,
}

/// The full JSON-defined workflow graph, as loaded from a template file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowGraph {
    pub workflow_name: String,
    #[serde(default)]
    pub description: String,
    pub phases: Vec<Phase>,
    #[serde(default)]
    pub initial_context: HashMap<String, String>,
}

impl WorkflowGraph {
    pub fn from_json(data: &str) -> crate::error::Result<Self> {
        serde_json::from_str(data).map_err(Into::into)
    }

    /// Resolve a step id by scanning phases → steps for a matching id
    /// (spec.md §4.2 step 1).
    pub fn find_step(&self, id: StepId) -> Option<&Step> {
        self.phases.iter().flat_map(|p| p.steps.iter()).find(|s| s.id == id)
    }

    pub fn all_steps(&self) -> Vec<&Step> {
        self.phases.iter().flat_map(|p| p.steps.iter()).collect()
    }

    pub fn first_step_id(&self) -> Option<StepId> {
        self.phases.iter().flat_map(|p| p.steps.iter()).next().map(|s| s.id)
    }
}
