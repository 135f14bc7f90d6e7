//! Role-specialized agents.
//!
//! Each agent advances the workflow by at most one task per turn. The
//! orchestrator plans once; operations and advisor work tasks they own,
//! invoking at most one tool per step through the registry.

mod advisor;
mod operations;
mod orchestrator;
mod worker;

pub use advisor::AdvisorAgent;
pub use operations::OperationsAgent;
pub use orchestrator::OrchestratorAgent;

use std::sync::Arc;

use async_trait::async_trait;

use nexhelm_tools::{Clock, ToolRegistry};

use crate::decision::DecisionClient;
use crate::error::EngineError;
use crate::events::EventSink;
use crate::state::{Task, WorkflowState};
use crate::types::AgentRole;

/// Everything an agent needs besides the state itself. One per workflow.
#[derive(Clone)]
pub struct AgentContext {
    pub registry: Arc<ToolRegistry>,
    pub llm: DecisionClient,
    pub sink: EventSink,
    pub clock: Arc<dyn Clock>,
}

/// A decision unit that advances the workflow by at most one task.
#[async_trait]
pub trait Agent: Send + Sync {
    fn role(&self) -> AgentRole;

    /// Work exactly one step: pick a ready task, decide, act, record.
    async fn step(&self, state: &mut WorkflowState, cx: &AgentContext)
        -> Result<(), EngineError>;
}

/// Compact state digest fed to the model each turn.
///
/// The labeled lines (`Request Type:`, `Client ID:`, `Current Task:`,
/// `Outcome:`) are a stable contract; deterministic adapters key off
/// them.
pub(crate) fn state_digest(state: &WorkflowState, current_task: Option<&Task>) -> String {
    let mut lines = vec![
        format!("Workflow: {}", state.workflow_id),
        format!("Request Type: {}", state.request.request_type),
        format!("Client ID: {}", state.request.client_id),
        format!("Status: {}", state.status.as_str()),
    ];

    if let Some(task) = current_task {
        lines.push(format!("Current Task: {}: {}", task.id, task.description));
    }

    if !state.tasks.is_empty() {
        lines.push("Tasks:".into());
        for task in &state.tasks {
            lines.push(format!(
                "  - {}: {} (status: {}, owner: {})",
                task.id,
                task.description,
                task.status.as_str(),
                task.owner
            ));
        }
    }

    if !state.outcome.is_empty() {
        lines.push(format!(
            "Outcome: {}",
            serde_json::Value::Object(state.outcome.clone())
        ));
    }

    let active: Vec<&str> = state
        .blockers
        .iter()
        .filter(|b| !b.resolved)
        .map(|b| b.description.as_str())
        .collect();
    if !active.is_empty() {
        lines.push("Active Blockers:".into());
        for blocker in active {
            lines.push(format!("  - {blocker}"));
        }
    }

    for message in state.messages.iter().rev().take(3).rev() {
        lines.push(format!("Note from {}: {}", message.from_agent, message.content));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Request, RequestSpec, WorkflowId};
    use chrono::Utc;

    #[test]
    fn test_digest_labels_stable() {
        let now = Utc::now();
        let request = Request::from_spec(RequestSpec::new("open_roth_ira", "c1"), now);
        let mut state = WorkflowState::new(WorkflowId::new("wf-d"), request, now);
        state.tasks = vec![Task::new("task_1", "Verify eligibility", AgentRole::Operations)];
        state
            .outcome
            .insert("account_number".into(), serde_json::json!("ROTH_IRA-1000"));

        let digest = state_digest(&state, state.tasks.first());
        assert!(digest.contains("Request Type: open_roth_ira"));
        assert!(digest.contains("Client ID: c1"));
        assert!(digest.contains("Current Task: task_1: Verify eligibility"));
        assert!(digest.contains("Outcome: {\"account_number\":\"ROTH_IRA-1000\"}"));
    }
}
