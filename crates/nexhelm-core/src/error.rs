//! Engine error types.

use thiserror::Error;

use crate::state::TaskStatus;

/// Errors that can occur while driving a workflow.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Workflow id is unknown to the engine
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    /// Planning produced no usable task graph
    #[error("Planning failed: {0}")]
    PlanningFailed(String),

    /// The planned dependency graph contains a cycle
    #[error("Cyclic dependency detected in task graph")]
    CyclicDependency,

    /// A task was asked to make an illegal status transition
    #[error("Invalid transition for task {task_id}: {from:?} -> {to:?}")]
    InvalidTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    /// A structural invariant of the state machine was violated
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    /// Referenced task does not exist
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// External cancellation was requested
    #[error("Workflow cancelled")]
    Cancelled,
}
