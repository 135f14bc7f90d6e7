//! Structured decisions from the LLM boundary.
//!
//! A single adapter call yields a JSON decision. The client enforces the
//! deadline and maps timeouts and unparseable output onto a conservative
//! fallback (no tool, task left pending) so a misbehaving model can never
//! wedge the executor.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::timeout;
use tracing::{debug, warn};

use nexhelm_llm::{LLMAdapter, LLMMessage};

/// Task status proposed by the model for the task it worked on.
///
/// The model is untrusted input; anything unrecognized reads as
/// `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum DecisionStatus {
    Completed,
    Failed,
    #[default]
    Pending,
}

impl From<String> for DecisionStatus {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "completed" => Self::Completed,
            "failed" | "blocked" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// One requested tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(alias = "name")]
    pub tool: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// Parsed agent decision.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentDecision {
    #[serde(default)]
    pub reasoning: String,
    #[serde(default, alias = "tools_to_use")]
    pub tools: Vec<ToolCall>,
    #[serde(default)]
    pub task_status: DecisionStatus,
    #[serde(default)]
    pub message_to_client: Option<String>,
}

impl AgentDecision {
    /// The conservative fallback: no tool, task left pending.
    pub fn fallback(reason: impl Into<String>) -> Self {
        Self {
            reasoning: reason.into(),
            tools: Vec::new(),
            task_status: DecisionStatus::Pending,
            message_to_client: None,
        }
    }
}

/// Result of one inference round-trip.
#[derive(Debug, Clone)]
pub struct Inference {
    pub decision: AgentDecision,
    /// The raw completion, kept for plan parsing and audit.
    pub raw: String,
    /// Whether the decision is the conservative fallback.
    pub fallback: bool,
    pub latency_ms: u64,
    pub cached: bool,
}

/// The narrow LLM boundary used by all agents.
#[derive(Clone)]
pub struct DecisionClient {
    adapter: Arc<dyn LLMAdapter>,
    deadline: Duration,
}

impl DecisionClient {
    pub fn new(adapter: Arc<dyn LLMAdapter>, deadline: Duration) -> Self {
        Self { adapter, deadline }
    }

    /// One call: role prompt + state digest in, structured decision out.
    ///
    /// Never errors; deadline expiry and parse failures degrade to the
    /// fallback decision with `fallback: true`.
    pub async fn infer(&self, system_prompt: &str, user_prompt: &str) -> Inference {
        let messages = [
            LLMMessage::system(system_prompt),
            LLMMessage::user(user_prompt),
        ];
        let started = std::time::Instant::now();

        let response = match timeout(self.deadline, self.adapter.generate(&messages)).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                warn!(error = %err, "LLM call failed, using fallback decision");
                return Inference {
                    decision: AgentDecision::fallback(format!("LLM call failed: {err}")),
                    raw: String::new(),
                    fallback: true,
                    latency_ms: started.elapsed().as_millis() as u64,
                    cached: false,
                };
            }
            Err(_) => {
                warn!(deadline_ms = self.deadline.as_millis() as u64,
                    "LLM call timed out, using fallback decision");
                return Inference {
                    decision: AgentDecision::fallback("LLM call timed out"),
                    raw: String::new(),
                    fallback: true,
                    latency_ms: started.elapsed().as_millis() as u64,
                    cached: false,
                };
            }
        };

        let latency_ms = started.elapsed().as_millis() as u64;
        match extract_json(&response.content)
            .and_then(|value| serde_json::from_value::<AgentDecision>(value).ok())
        {
            Some(decision) => {
                debug!(latency_ms, cached = response.cached, "Decision parsed");
                Inference {
                    decision,
                    raw: response.content,
                    fallback: false,
                    latency_ms,
                    cached: response.cached,
                }
            }
            None => {
                warn!("Unparseable LLM response, using fallback decision");
                Inference {
                    decision: AgentDecision::fallback("Unparseable LLM response"),
                    raw: response.content,
                    fallback: true,
                    latency_ms,
                    cached: response.cached,
                }
            }
        }
    }
}

/// Pull the first JSON object out of a completion, tolerating code fences
/// and surrounding prose.
pub(crate) fn extract_json(content: &str) -> Option<Value> {
    let trimmed = content.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return value.is_object().then_some(value);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&trimmed[start..=end])
        .ok()
        .filter(Value::is_object)
}
