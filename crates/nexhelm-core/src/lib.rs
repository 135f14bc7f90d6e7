//! # nexhelm-core
//!
//! The workflow state machine at the heart of the Nexhelm engine.
//!
//! A high-level request ("open a Roth IRA for this client") becomes a
//! dependency-ordered task graph planned by the orchestrator agent,
//! validated against domain rules, and executed by role-specialized
//! agents that invoke tools against simulated backends. Every decision,
//! tool call, and state mutation streams to observers through the bus.
//!
//! - [`WorkflowEngine`] — the public API: `start(request)` returns a
//!   workflow id plus an event subscription; `cancel(id)` stops one.
//! - [`WorkflowState`] — the single shared document, owned exclusively
//!   by its executor task.
//! - [`route`] — the pure supervisor function selecting the next agent.
//! - [`TaskValidator`] — the structural safety net over planned graphs.
//!
//! The LLM is treated as an adversarial oracle: the single-task rule, the
//! single-tool rule, the error-propagation rule, and the validator all
//! exist because a syntactically valid decision may still be wrong.

pub mod agents;
mod decision;
mod engine;
mod error;
mod events;
mod executor;
mod router;
mod state;
mod types;
mod validator;

#[cfg(test)]
mod integration_test;

pub use decision::{AgentDecision, DecisionClient, DecisionStatus, Inference, ToolCall};
pub use engine::{EngineConfig, WorkflowEngine, WorkflowHandle};
pub use error::EngineError;
pub use events::EventSink;
pub use router::{route, RouteDecision};
pub use state::{
    Blocker, DecisionRecord, MessageRecord, NextAction, Priority, Task, TaskStatus, WorkflowState,
    WorkflowStatus,
};
pub use types::{AgentRole, Request, RequestSpec, WorkflowId};
pub use validator::{is_acyclic, TaskValidator, ValidationRule};
