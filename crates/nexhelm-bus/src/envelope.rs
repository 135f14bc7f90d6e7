//! Event envelope and the closed event-type set.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of event types carried on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    WorkflowStart,
    AgentMessage,
    LlmCall,
    ToolExecution,
    Routing,
    TaskUpdate,
    Success,
    Notification,
    Log,
    Error,
    WorkflowComplete,
}

impl EventType {
    /// Critical events are delivered even under a shedding overflow
    /// policy; the publisher blocks rather than drop them.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Self::WorkflowStart
                | Self::TaskUpdate
                | Self::ToolExecution
                | Self::WorkflowComplete
                | Self::Error
        )
    }

    /// Terminal events end the workflow's stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::WorkflowComplete)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkflowStart => "workflow_start",
            Self::AgentMessage => "agent_message",
            Self::LlmCall => "llm_call",
            Self::ToolExecution => "tool_execution",
            Self::Routing => "routing",
            Self::TaskUpdate => "task_update",
            Self::Success => "success",
            Self::Notification => "notification",
            Self::Log => "log",
            Self::Error => "error",
            Self::WorkflowComplete => "workflow_complete",
        }
    }
}

/// A single event published to observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub workflow_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    pub payload: Value,
    pub timestamp_ms: i64,
}

impl Event {
    /// Create an event with no agent attribution.
    pub fn new(
        event_type: EventType,
        workflow_id: impl Into<String>,
        payload: Value,
        timestamp_ms: i64,
    ) -> Self {
        Self {
            event_type,
            workflow_id: workflow_id.into(),
            agent: None,
            payload,
            timestamp_ms,
        }
    }

    /// Attribute the event to an agent.
    #[must_use]
    pub fn from_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_critical_set() {
        assert!(EventType::ToolExecution.is_critical());
        assert!(EventType::WorkflowComplete.is_critical());
        assert!(!EventType::Log.is_critical());
        assert!(!EventType::LlmCall.is_critical());
    }

    #[test]
    fn test_envelope_wire_format() {
        let event = Event::new(
            EventType::TaskUpdate,
            "wf-1",
            json!({"task_id": "task_1", "status": "completed"}),
            42,
        )
        .from_agent("operations_agent");

        let wire = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["type"], json!("task_update"));
        assert_eq!(wire["agent"], json!("operations_agent"));
        assert_eq!(wire["timestamp_ms"], json!(42));
    }
}
