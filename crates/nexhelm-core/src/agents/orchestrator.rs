//! Orchestrator agent: plans the task graph.
//!
//! Runs exactly once, before any worker. Asks the model for a plan —
//! outcomes, not tools — and falls back to a deterministic template when
//! the model times out or returns nothing usable. Either way the plan
//! must be a DAG; a cycle fails planning outright.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use nexhelm_tools::ToolOutput;

use super::{Agent, AgentContext};
use crate::decision::extract_json;
use crate::error::EngineError;
use crate::state::{NextAction, Priority, Task, WorkflowState, WorkflowStatus};
use crate::types::AgentRole;
use crate::validator::is_acyclic;

const SYSTEM_PROMPT: &str = "\
You are the Workflow Orchestrator at Nexhelm, a financial advisory firm. \
You analyze client requests and produce a workflow plan: an ordered task \
list with owners and dependencies.

Planning principles:
- Start with eligibility verification for financial products.
- Describe WHAT each task accomplishes, never which tool to call.
- Client-facing tasks belong to advisor_agent; backend and compliance \
tasks belong to operations_agent.
- Sequence dependencies so each task lists the task ids it needs first.

Respond in JSON:
{
  \"reasoning\": \"your analysis of the request\",
  \"workflow_plan\": {
    \"tasks\": [
      {
        \"id\": \"task_1\",
        \"description\": \"what this step accomplishes\",
        \"owner\": \"advisor_agent|operations_agent\",
        \"dependencies\": [],
        \"priority\": \"high|normal|low\"
      }
    ]
  }
}";

#[derive(Debug, Deserialize)]
struct PlanEnvelope {
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    workflow_plan: PlanBody,
}

#[derive(Debug, Deserialize, Default)]
struct PlanBody {
    #[serde(default)]
    tasks: Vec<PlanTask>,
}

#[derive(Debug, Deserialize)]
struct PlanTask {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    priority: Option<Priority>,
}

/// Plans the workflow; runs once per workflow.
#[derive(Debug, Default)]
pub struct OrchestratorAgent;

impl OrchestratorAgent {
    pub fn new() -> Self {
        Self
    }

    fn build_prompt(state: &WorkflowState, client_info: &Option<ToolOutput>) -> String {
        let context = match client_info {
            Some(info) => Value::Object(info.clone()).to_string(),
            None => "Client information not available".to_string(),
        };
        format!(
            "Create a workflow plan for this client request.\n\
             Request Type: {}\n\
             Client ID: {}\n\
             Client Context: {}\n\n\
             Produce the full task list with owners, dependencies, and priorities.",
            state.request.request_type, state.request.client_id, context
        )
    }

    /// Deterministic template used when the model yields no usable plan.
    fn fallback_tasks(request_type: &str) -> Vec<Task> {
        let lower = request_type.to_lowercase();
        if lower.contains("ira") {
            vec![
                Task::new(
                    "task_1",
                    "Verify IRA income eligibility and regulatory requirements",
                    AgentRole::Operations,
                )
                .with_priority(Priority::High),
                Task::new(
                    "task_2",
                    "Send personalized IRA application form to client",
                    AgentRole::Advisor,
                )
                .with_dependencies(vec!["task_1".into()])
                .with_priority(Priority::High),
                Task::new(
                    "task_3",
                    "Review and validate submitted IRA application for completeness",
                    AgentRole::Operations,
                )
                .with_dependencies(vec!["task_2".into()])
                .with_priority(Priority::High),
                Task::new(
                    "task_4",
                    "Open IRA account in system and generate account number",
                    AgentRole::Operations,
                )
                .with_dependencies(vec!["task_3".into()])
                .with_priority(Priority::High),
                Task::new(
                    "task_5",
                    "Notify client of successful account opening and next steps",
                    AgentRole::Advisor,
                )
                .with_dependencies(vec!["task_4".into()])
                .with_priority(Priority::High),
            ]
        } else {
            vec![
                Task::new(
                    "task_1",
                    format!("Analyze and process {request_type} request"),
                    AgentRole::Operations,
                )
                .with_priority(Priority::High),
                Task::new(
                    "task_2",
                    format!("Complete {request_type} workflow and update the client"),
                    AgentRole::Advisor,
                )
                .with_dependencies(vec!["task_1".into()])
                .with_priority(Priority::High),
            ]
        }
    }

    /// Turn planner output into well-formed tasks: unique ids, known
    /// owners, dependencies that reference real tasks.
    fn normalize(plan: Vec<PlanTask>) -> Vec<Task> {
        let mut seen = std::collections::HashSet::new();
        let mut tasks: Vec<Task> = plan
            .into_iter()
            .enumerate()
            .map(|(idx, planned)| {
                let fallback_id = format!("task_{}", idx + 1);
                let proposed = planned
                    .id
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| fallback_id.clone());
                let id = if seen.contains(&proposed) {
                    fallback_id
                } else {
                    proposed
                };
                seen.insert(id.clone());
                let description = planned
                    .description
                    .unwrap_or_else(|| format!("Task {}", idx + 1));
                let owner = planned
                    .owner
                    .as_deref()
                    .map(AgentRole::parse_owner)
                    .unwrap_or(AgentRole::Operations);
                Task::new(id, description, owner)
                    .with_dependencies(planned.dependencies)
                    .with_priority(planned.priority.unwrap_or(Priority::High))
            })
            .collect();

        let ids: std::collections::HashSet<String> =
            tasks.iter().map(|t| t.id.clone()).collect();
        for task in &mut tasks {
            task.dependencies.retain(|dep| ids.contains(dep));
        }
        tasks
    }
}

#[async_trait]
impl Agent for OrchestratorAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Orchestrator
    }

    async fn step(
        &self,
        state: &mut WorkflowState,
        cx: &AgentContext,
    ) -> Result<(), EngineError> {
        let now = cx.clock.now();

        // Enrich planning with the client profile; planning proceeds on a
        // degraded context when the client is unknown.
        let mut params = ToolOutput::new();
        params.insert("client_id".into(), json!(state.request.client_id));
        let client_info = cx.registry.invoke("get_client_info", &params).await;
        cx.sink
            .tool_execution(AgentRole::Orchestrator, "get_client_info", &params, &client_info)
            .await;
        let client_info = client_info.ok();

        if let Some(info) = &client_info {
            let client = info.get("client").cloned().unwrap_or(Value::Null);
            state.context.insert(
                "client_age".into(),
                client.get("age").cloned().unwrap_or(json!(0)),
            );
            state.context.insert(
                "client_income".into(),
                client.get("income").cloned().unwrap_or(json!(0)),
            );
            state.context.insert(
                "existing_accounts".into(),
                client.get("existing_accounts").cloned().unwrap_or(json!([])),
            );
            state.context.insert(
                "available_documents".into(),
                info.get("available_documents").cloned().unwrap_or(json!([])),
            );
            if let Some(name) = client.get("name") {
                state.context.insert("client_name".into(), name.clone());
            }
        }

        let prompt = Self::build_prompt(state, &client_info);
        cx.sink.llm_call_begin(AgentRole::Orchestrator).await;
        let inference = cx.llm.infer(SYSTEM_PROMPT, &prompt).await;
        cx.sink
            .llm_call_end(AgentRole::Orchestrator, inference.latency_ms, inference.cached)
            .await;

        let parsed: Option<PlanEnvelope> = extract_json(&inference.raw)
            .and_then(|value| serde_json::from_value(value).ok())
            .filter(|envelope: &PlanEnvelope| !envelope.workflow_plan.tasks.is_empty());

        let (tasks, reasoning) = match parsed {
            Some(envelope) if !inference.fallback => {
                let tasks = Self::normalize(envelope.workflow_plan.tasks);
                let reasoning = if envelope.reasoning.is_empty() {
                    "Workflow plan created".to_string()
                } else {
                    envelope.reasoning
                };
                (tasks, reasoning)
            }
            _ => {
                warn!("Planner produced no usable plan, using fallback template");
                (
                    Self::fallback_tasks(&state.request.request_type),
                    format!(
                        "Created fallback workflow plan for {}",
                        state.request.request_type
                    ),
                )
            }
        };

        if tasks.is_empty() {
            return Err(EngineError::PlanningFailed("plan contains no tasks".into()));
        }
        if !is_acyclic(&tasks) {
            return Err(EngineError::CyclicDependency);
        }

        info!(task_count = tasks.len(), "Workflow plan ready");
        state.next_actions = tasks
            .first()
            .map(|task| NextAction {
                agent: task.owner,
                action: task.description.clone(),
                priority: task.priority,
            })
            .into_iter()
            .collect();
        state.tasks = tasks;
        state.status = WorkflowStatus::InProgress;
        state.append_message(AgentRole::Orchestrator, reasoning.clone(), "workflow_planning", now);
        state.append_decision(
            AgentRole::Orchestrator,
            "Created workflow plan",
            reasoning,
            now,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_fixes_duplicate_ids_and_bad_deps() {
        let plan = vec![
            PlanTask {
                id: Some("task_1".into()),
                description: Some("a".into()),
                owner: Some("operations_agent".into()),
                dependencies: vec![],
                priority: None,
            },
            PlanTask {
                id: Some("task_1".into()),
                description: Some("b".into()),
                owner: Some("advisor_agent".into()),
                dependencies: vec!["task_1".into(), "task_99".into()],
                priority: None,
            },
        ];
        let tasks = OrchestratorAgent::normalize(plan);
        assert_eq!(tasks[0].id, "task_1");
        assert_eq!(tasks[1].id, "task_2");
        // The unknown dependency is dropped, the real one kept.
        assert_eq!(tasks[1].dependencies, vec!["task_1".to_string()]);
        assert_eq!(tasks[1].owner, AgentRole::Advisor);
    }

    #[test]
    fn test_fallback_plan_shape() {
        let tasks = OrchestratorAgent::fallback_tasks("open_roth_ira");
        assert_eq!(tasks.len(), 5);
        assert!(is_acyclic(&tasks));
        assert_eq!(tasks[0].owner, AgentRole::Operations);
        assert_eq!(tasks[4].owner, AgentRole::Advisor);

        let generic = OrchestratorAgent::fallback_tasks("change_beneficiary");
        assert_eq!(generic.len(), 2);
    }
}
