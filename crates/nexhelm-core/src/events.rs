//! Event publication helpers.
//!
//! [`EventSink`] pins every envelope to one workflow and centralizes the
//! payload schema per event type, so agents and the executor publish
//! through one vocabulary.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use nexhelm_bus::{Event, EventBus, EventType};
use nexhelm_tools::{Clock, ToolError, ToolOutput};

use crate::state::{Task, WorkflowState};
use crate::types::AgentRole;

/// Publishes events for a single workflow.
#[derive(Clone)]
pub struct EventSink {
    bus: Arc<EventBus>,
    workflow_id: String,
    clock: Arc<dyn Clock>,
}

impl EventSink {
    pub fn new(bus: Arc<EventBus>, workflow_id: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            bus,
            workflow_id: workflow_id.into(),
            clock,
        }
    }

    fn event(&self, event_type: EventType, payload: Value) -> Event {
        Event::new(event_type, self.workflow_id.clone(), payload, self.clock.now_ms())
    }

    pub async fn workflow_start(&self, state: &WorkflowState) {
        self.bus
            .publish(self.event(EventType::WorkflowStart, json!({ "request": state.request })))
            .await;
    }

    pub async fn task_update(&self, task: &Task) {
        self.bus
            .publish(
                self.event(
                    EventType::TaskUpdate,
                    json!({
                        "task_id": task.id,
                        "status": task.status,
                        "owner": task.owner,
                        "description": task.description,
                        "result": task.result,
                        "dependencies": task.dependencies,
                    }),
                )
                .from_agent(task.owner.as_str()),
            )
            .await;
    }

    pub async fn tool_execution(
        &self,
        agent: AgentRole,
        tool: &str,
        params: &Map<String, Value>,
        result: &Result<ToolOutput, ToolError>,
    ) {
        let result_json = match result {
            Ok(payload) => json!({ "kind": "ok", "payload": payload }),
            Err(err) => json!({ "kind": err.kind(), "message": err.to_string() }),
        };
        self.bus
            .publish(
                self.event(
                    EventType::ToolExecution,
                    json!({
                        "agent": agent,
                        "tool": tool,
                        "params": params,
                        "result": result_json,
                    }),
                )
                .from_agent(agent.as_str()),
            )
            .await;
    }

    pub async fn llm_call_begin(&self, agent: AgentRole) {
        self.bus
            .publish(
                self.event(
                    EventType::LlmCall,
                    json!({ "agent": agent, "phase": "begin", "cached": false }),
                )
                .from_agent(agent.as_str()),
            )
            .await;
    }

    pub async fn llm_call_end(&self, agent: AgentRole, latency_ms: u64, cached: bool) {
        self.bus
            .publish(
                self.event(
                    EventType::LlmCall,
                    json!({
                        "agent": agent,
                        "phase": "end",
                        "latency_ms": latency_ms,
                        "cached": cached,
                    }),
                )
                .from_agent(agent.as_str()),
            )
            .await;
    }

    pub async fn routing(&self, message: impl Into<String>) {
        self.bus
            .publish(self.event(EventType::Routing, json!({ "message": message.into() })))
            .await;
    }

    pub async fn agent_message(&self, agent: AgentRole, message: impl Into<String>) {
        self.bus
            .publish(
                self.event(
                    EventType::AgentMessage,
                    json!({ "agent": agent, "message": message.into() }),
                )
                .from_agent(agent.as_str()),
            )
            .await;
    }

    pub async fn success(&self, agent: AgentRole, message: impl Into<String>) {
        self.bus
            .publish(
                self.event(EventType::Success, json!({ "agent": agent, "message": message.into() }))
                    .from_agent(agent.as_str()),
            )
            .await;
    }

    pub async fn notification(&self, client_id: &str, kind: &str, content: &str) {
        self.bus
            .publish(self.event(
                EventType::Notification,
                json!({ "client_id": client_id, "type": kind, "content": content }),
            ))
            .await;
    }

    pub async fn log(&self, agent: Option<AgentRole>, message: impl Into<String>) {
        let mut event = self.event(EventType::Log, json!({ "message": message.into() }));
        if let Some(agent) = agent {
            event = event.from_agent(agent.as_str());
        }
        self.bus.publish(event).await;
    }

    pub async fn error(&self, agent: Option<AgentRole>, message: impl Into<String>, recoverable: bool) {
        let message = message.into();
        let mut event = self.event(
            EventType::Error,
            json!({ "agent": agent, "message": message, "recoverable": recoverable }),
        );
        if let Some(agent) = agent {
            event = event.from_agent(agent.as_str());
        }
        self.bus.publish(event).await;
    }

    /// Terminal event; closes the stream for this workflow.
    pub async fn workflow_complete(&self, state: &WorkflowState) {
        let blockers: Vec<&str> = state
            .blockers
            .iter()
            .filter(|b| !b.resolved)
            .map(|b| b.description.as_str())
            .collect();
        self.bus
            .publish(self.event(
                EventType::WorkflowComplete,
                json!({
                    "status": state.status,
                    "outcome": state.outcome,
                    "tasks_completed": state.tasks_completed(),
                    "total_tasks": state.tasks.len(),
                    "blockers": blockers,
                }),
            ))
            .await;
    }
}
