//! Step: one unit of task work executed to a terminal result.
//!
//! A `Step` is owned by the caller of the engine and mutated only during a
//! single `execute_step` invocation. Status is monotonic within that
//! invocation: `Pending → Running → {Completed | Failed}`.

use serde::{Deserialize, Serialize};

/// Execution status of a step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl StepStatus {
    /// A terminal status never regresses.
    pub fn is_terminal(self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Failed)
    }
}

/// One unit of task work.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Step {
    /// What this step is supposed to accomplish
    pub description: String,

    /// Current execution status
    #[serde(default)]
    pub status: StepStatus,

    /// Whether the step reached its goal
    #[serde(default)]
    pub success: bool,

    /// Human-readable result text
    #[serde(default)]
    pub result: String,

    /// Paths of files produced by the step, in order
    #[serde(default)]
    pub attachments: Vec<String>,

    /// Error text when the step failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Step {
    /// Create a pending step from a description.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    /// Fold a terminal answer into this step.
    pub fn apply_outcome(&mut self, outcome: StepOutcome) {
        self.success = outcome.success;
        self.result = outcome.result;
        self.attachments = outcome.attachments;
    }
}

/// The terminal answer schema the model is asked to produce.
///
/// `success` is required; a parsed answer that does not fit this shape is
/// recovered by reading `result`/`attachments` keys directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub success: bool,

    #[serde(default)]
    pub result: String,

    #[serde(default)]
    pub attachments: Vec<String>,
}
