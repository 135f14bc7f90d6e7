//! Core identifiers and request types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(String);

impl WorkflowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(format!("wf-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WorkflowId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The agents that participate in a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentRole {
    #[serde(rename = "orchestrator_agent")]
    Orchestrator,
    #[serde(rename = "operations_agent")]
    Operations,
    #[serde(rename = "advisor_agent")]
    Advisor,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orchestrator => "orchestrator_agent",
            Self::Operations => "operations_agent",
            Self::Advisor => "advisor_agent",
        }
    }

    /// Parse a planner-supplied owner name; unknown owners default to
    /// operations, mirroring how plans are normalized.
    pub fn parse_owner(value: &str) -> Self {
        match value.trim() {
            "advisor_agent" | "advisor" => Self::Advisor,
            _ => Self::Operations,
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for starting a workflow.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub request_type: String,
    pub client_id: String,
    pub client_name: Option<String>,
    pub initiator: Option<String>,
}

impl RequestSpec {
    pub fn new(request_type: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            request_type: request_type.into(),
            client_id: client_id.into(),
            client_name: None,
            initiator: None,
        }
    }

    #[must_use]
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_initiator(mut self, initiator: impl Into<String>) -> Self {
        self.initiator = Some(initiator.into());
        self
    }
}

/// The request a workflow executes. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "type")]
    pub request_type: String,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Request {
    pub fn from_spec(spec: RequestSpec, created_at: DateTime<Utc>) -> Self {
        Self {
            request_type: spec.request_type,
            client_id: spec.client_id,
            client_name: spec.client_name,
            initiator: spec.initiator,
            created_at,
        }
    }

    /// The account type implied by the request family.
    pub fn account_type(&self) -> &'static str {
        let lower = self.request_type.to_lowercase();
        if lower.contains("roth") {
            "roth_ira"
        } else if lower.contains("ira") {
            "traditional_ira"
        } else {
            "brokerage"
        }
    }
}
