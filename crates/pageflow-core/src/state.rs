use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a workflow across runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowState {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl WorkflowState {
    pub fn can_run(&self) -> bool {
        matches!(self, WorkflowState::Pending | WorkflowState::Failed)
    }

    /// Transition taken when a run is entered (from a runnable state) or finished (from `Running`).
    pub fn next(self, success: bool) -> WorkflowState {
        match self {
            WorkflowState::Pending | WorkflowState::Failed => WorkflowState::Running,
            WorkflowState::Running if success => WorkflowState::Completed,
            WorkflowState::Running => WorkflowState::Failed,
            WorkflowState::Completed => WorkflowState::Completed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Completed | WorkflowState::Failed)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowState::Pending => "Pending",
            WorkflowState::Running => "Running",
            WorkflowState::Completed => "Completed",
            WorkflowState::Failed => "Failed",
        };
        f.write_str(s)
    }
}
