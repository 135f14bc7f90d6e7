//! Workflow executor.
//!
//! Drives one workflow from request to terminal state on its own task:
//! plan, validate, then route/step until done, bounded by the step
//! budget. The executor owns the state exclusively; agents only see it
//! through `step`. Cancellation is observed between steps: the workflow
//! is failed, a `cancelled` blocker recorded, and the stream closed.

use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::agents::{Agent, AgentContext, AdvisorAgent, OperationsAgent, OrchestratorAgent};
use crate::error::EngineError;
use crate::events::EventSink;
use crate::router::{route, RouteDecision};
use crate::state::{WorkflowState, WorkflowStatus};
use crate::types::AgentRole;
use crate::validator::TaskValidator;

/// Executes workflows to completion.
pub(crate) struct WorkflowExecutor {
    orchestrator: OrchestratorAgent,
    operations: OperationsAgent,
    advisor: AdvisorAgent,
    validator: TaskValidator,
    max_steps: u32,
}

impl WorkflowExecutor {
    pub fn new(max_steps: u32) -> Self {
        Self {
            orchestrator: OrchestratorAgent::new(),
            operations: OperationsAgent::new(),
            advisor: AdvisorAgent::new(),
            validator: TaskValidator::standard(),
            max_steps,
        }
    }

    fn agent_for(&self, role: AgentRole) -> &dyn Agent {
        match role {
            AgentRole::Orchestrator => &self.orchestrator,
            AgentRole::Operations => &self.operations,
            AgentRole::Advisor => &self.advisor,
        }
    }

    /// Run the workflow to a terminal state and publish the terminal
    /// event. Always returns the final state.
    #[instrument(skip_all, fields(workflow_id = %state.workflow_id))]
    pub async fn run(
        &self,
        mut state: WorkflowState,
        cx: AgentContext,
        mut cancel: watch::Receiver<bool>,
    ) -> WorkflowState {
        cx.sink.workflow_start(&state).await;

        if let Err(err) = self.drive(&mut state, &cx, &mut cancel).await {
            self.fail_with(&mut state, &cx.sink, err).await;
        }

        // Terminal settlement: the outcome is observable only on success.
        if state.status != WorkflowStatus::Completed {
            state.outcome.clear();
        }
        info!(
            status = state.status.as_str(),
            tasks_completed = state.tasks_completed(),
            total_tasks = state.tasks.len(),
            "Workflow finished"
        );
        cx.sink.workflow_complete(&state).await;
        state
    }

    /// Plan, validate, then loop route/step under the step budget.
    async fn drive(
        &self,
        state: &mut WorkflowState,
        cx: &AgentContext,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<(), EngineError> {
        // Planning counts against the budget like any other agent turn.
        self.checked_step(AgentRole::Orchestrator, state, cx, cancel).await?;
        let mut steps: u32 = 1;

        let planned = std::mem::take(&mut state.tasks);
        state.tasks = self.validator.apply(&state.request, planned);
        for task in &state.tasks {
            cx.sink.task_update(task).await;
        }

        while steps < self.max_steps {
            match route(state)? {
                RouteDecision::Done => {
                    cx.sink
                        .routing(format!("Workflow done: {}", state.status.as_str()))
                        .await;
                    return Ok(());
                }
                RouteDecision::Next(role) => {
                    cx.sink.routing(format!("Next agent: {role}")).await;
                    self.checked_step(role, state, cx, cancel).await?;
                    steps += 1;
                }
            }
        }

        // Budget exhausted; one last routing pass may still observe a
        // finished graph.
        if matches!(route(state)?, RouteDecision::Done) {
            return Ok(());
        }
        warn!(max_steps = self.max_steps, "Step budget exhausted");
        let now = cx.clock.now();
        state.add_blocker(
            format!("Step budget exhausted after {} steps", self.max_steps),
            AgentRole::Orchestrator,
            now,
        );
        state.status = WorkflowStatus::Failed;
        Ok(())
    }

    /// Run one agent step unless cancellation arrives first.
    async fn checked_step(
        &self,
        role: AgentRole,
        state: &mut WorkflowState,
        cx: &AgentContext,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<(), EngineError> {
        if *cancel.borrow() {
            return Err(EngineError::Cancelled);
        }
        let agent = self.agent_for(role);
        let mut step_result: Option<Result<(), EngineError>> = None;
        let was_cancelled = tokio::select! {
            biased;
            _ = cancelled(cancel) => true,
            result = agent.step(state, cx) => {
                step_result = Some(result);
                false
            }
        };
        if was_cancelled {
            // An in-flight tool call may still finish; its result is
            // discarded along with the step future.
            return Err(EngineError::Cancelled);
        }
        step_result.unwrap_or(Ok(()))
    }

    /// Map a driver error onto the failed terminal state.
    async fn fail_with(&self, state: &mut WorkflowState, sink: &EventSink, err: EngineError) {
        let now = state.updated_at;
        match &err {
            EngineError::Cancelled => {
                info!("Workflow cancelled");
                state.add_blocker("cancelled", AgentRole::Orchestrator, now);
            }
            other => {
                sink.error(None, other.to_string(), false).await;
                state.add_blocker(other.to_string(), AgentRole::Orchestrator, now);
            }
        }
        state.status = WorkflowStatus::Failed;
    }
}

/// Resolves when cancellation is signalled; never resolves otherwise.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender dropped without cancelling; wait forever.
            std::future::pending::<()>().await;
        }
    }
}
