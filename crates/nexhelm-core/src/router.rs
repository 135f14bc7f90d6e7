//! Supervisor routing.
//!
//! A pure function over the workflow state: pick the next agent or
//! declare the workflow done. Terminal statuses win, then task-graph
//! completion, then the ready set ordered by priority with lowest id as
//! the tie-break.

use tracing::debug;

use crate::error::EngineError;
use crate::state::{TaskStatus, WorkflowState, WorkflowStatus};
use crate::types::AgentRole;
use crate::validator::all_terminal;

/// Outcome of one routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Hand control to this agent.
    Next(AgentRole),
    /// The workflow is finished; stop the loop.
    Done,
}

/// Select the next agent, or finish the workflow.
///
/// May mark the state `completed`, `failed`, or `blocked` as a side
/// effect of recognizing a terminal task graph or a dependency deadlock.
pub fn route(state: &mut WorkflowState) -> Result<RouteDecision, EngineError> {
    if state.status.is_terminal() {
        debug!(status = state.status.as_str(), "Routing: terminal status");
        return Ok(RouteDecision::Done);
    }

    if all_terminal(&state.tasks) {
        let all_completed = state
            .tasks
            .iter()
            .all(|t| t.status == TaskStatus::Completed);
        state.status = if !state.outcome.is_empty() || all_completed {
            WorkflowStatus::Completed
        } else {
            WorkflowStatus::Failed
        };
        debug!(status = state.status.as_str(), "Routing: all tasks terminal");
        return Ok(RouteDecision::Done);
    }

    let in_progress = state
        .tasks
        .iter()
        .any(|t| t.status == TaskStatus::InProgress);
    let ready = state.ready_tasks();

    if ready.is_empty() {
        if in_progress {
            // Unreachable while agents terminalize the task they start.
            return Err(EngineError::InvariantViolation(
                "no ready tasks while a task is in progress".into(),
            ));
        }
        let now = state.updated_at;
        state.add_blocker(
            "Dependency deadlock: pending tasks remain but none are ready",
            AgentRole::Orchestrator,
            now,
        );
        debug!("Routing: dependency deadlock, blocking workflow");
        return Ok(RouteDecision::Done);
    }

    let next = ready
        .iter()
        .max_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| id_ordinal(&b.id).cmp(&id_ordinal(&a.id)))
        })
        .map(|t| (t.owner, t.id.clone()));

    // max_by on a non-empty list always yields a task.
    let (owner, task_id) = next.ok_or_else(|| {
        EngineError::InvariantViolation("ready set vanished during routing".into())
    })?;
    debug!(task_id = %task_id, owner = %owner, "Routing: selected next agent");
    Ok(RouteDecision::Next(owner))
}

/// Numeric ordinal of a `task_N` id, for lowest-id tie-breaks. Ids
/// without a numeric suffix sort after numbered ones.
fn id_ordinal(id: &str) -> u64 {
    id.rsplit('_')
        .next()
        .and_then(|suffix| suffix.parse().ok())
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Priority, Task};
    use crate::types::{Request, RequestSpec, WorkflowId};
    use chrono::Utc;

    fn state_with(tasks: Vec<Task>) -> WorkflowState {
        let now = Utc::now();
        let request = Request::from_spec(RequestSpec::new("open_roth_ira", "c1"), now);
        let mut state = WorkflowState::new(WorkflowId::new("wf-route"), request, now);
        state.status = WorkflowStatus::InProgress;
        state.tasks = tasks;
        state
    }

    #[test]
    fn test_terminal_status_routes_done() {
        let mut state = state_with(vec![Task::new("task_1", "t", AgentRole::Operations)]);
        state.status = WorkflowStatus::Blocked;
        assert_eq!(route(&mut state).unwrap(), RouteDecision::Done);
    }

    #[test]
    fn test_all_completed_marks_completed() {
        let mut state = state_with(vec![{
            let mut t = Task::new("task_1", "t", AgentRole::Operations);
            t.status = TaskStatus::Completed;
            t
        }]);
        assert_eq!(route(&mut state).unwrap(), RouteDecision::Done);
        assert_eq!(state.status, WorkflowStatus::Completed);
    }

    #[test]
    fn test_failed_task_without_outcome_marks_failed() {
        let mut state = state_with(vec![{
            let mut t = Task::new("task_1", "t", AgentRole::Operations);
            t.status = TaskStatus::Failed;
            t
        }]);
        assert_eq!(route(&mut state).unwrap(), RouteDecision::Done);
        assert_eq!(state.status, WorkflowStatus::Failed);
    }

    #[test]
    fn test_priority_then_lowest_id() {
        let mut state = state_with(vec![
            Task::new("task_1", "a", AgentRole::Advisor),
            Task::new("task_2", "b", AgentRole::Operations).with_priority(Priority::High),
            Task::new("task_3", "c", AgentRole::Operations).with_priority(Priority::High),
        ]);
        // High priority wins over the earlier normal task; lowest id
        // breaks the tie between the two high tasks.
        assert_eq!(
            route(&mut state).unwrap(),
            RouteDecision::Next(AgentRole::Operations)
        );

        let mut state = state_with(vec![
            Task::new("task_1", "a", AgentRole::Advisor),
            Task::new("task_2", "b", AgentRole::Operations),
        ]);
        assert_eq!(
            route(&mut state).unwrap(),
            RouteDecision::Next(AgentRole::Advisor)
        );
    }

    #[test]
    fn test_numeric_id_tiebreak() {
        let mut state = state_with(vec![
            Task::new("task_10", "j", AgentRole::Advisor),
            Task::new("task_2", "b", AgentRole::Operations),
        ]);
        // task_2 < task_10 numerically even though "task_10" < "task_2"
        // lexicographically.
        assert_eq!(
            route(&mut state).unwrap(),
            RouteDecision::Next(AgentRole::Operations)
        );
    }

    #[test]
    fn test_dependency_deadlock_blocks() {
        let mut state = state_with(vec![{
            let mut t = Task::new("task_2", "b", AgentRole::Operations);
            t.dependencies = vec!["task_1".into()];
            t
        }, {
            let mut t = Task::new("task_1", "a", AgentRole::Operations);
            t.status = TaskStatus::Failed;
            t
        }]);
        assert_eq!(route(&mut state).unwrap(), RouteDecision::Done);
        assert_eq!(state.status, WorkflowStatus::Blocked);
        assert!(state.has_unresolved_blockers());
    }

    #[test]
    fn test_in_progress_with_empty_ready_set_is_violation() {
        let mut state = state_with(vec![{
            let mut t = Task::new("task_1", "a", AgentRole::Operations);
            t.status = TaskStatus::InProgress;
            t
        }]);
        assert!(route(&mut state).is_err());
    }
}
