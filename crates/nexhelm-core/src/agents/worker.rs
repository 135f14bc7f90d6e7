//! Shared step implementation for the worker agents.
//!
//! Operations and advisor differ in their prompts, authorized tools, and
//! a couple of post-tool hooks; the step protocol itself is identical:
//!
//! 1. Pick the first ready task this role owns and start it.
//! 2. Ask the model for a structured decision.
//! 3. Invoke at most one authorized tool.
//! 4. Translate failures and semantic falsity into a blocker.
//! 5. Terminalize the task, record the decision, publish events.

use serde_json::Value;
use tracing::{info, warn};

use nexhelm_tools::ToolOutput;

use super::{state_digest, AgentContext};
use crate::decision::{AgentDecision, DecisionStatus, ToolCall};
use crate::error::EngineError;
use crate::state::{NextAction, TaskStatus, WorkflowState};
use crate::types::AgentRole;

/// Static configuration distinguishing one worker role from another.
#[derive(Debug)]
pub(crate) struct WorkerProfile {
    pub role: AgentRole,
    pub system_prompt: &'static str,
    pub authorized_tools: &'static [&'static str],
}

impl WorkerProfile {
    fn is_authorized(&self, tool: &str) -> bool {
        self.authorized_tools.contains(&tool)
    }
}

pub(crate) async fn run_step(
    profile: &WorkerProfile,
    state: &mut WorkflowState,
    cx: &AgentContext,
) -> Result<(), EngineError> {
    let task = state
        .first_ready_task_for(profile.role)
        .cloned()
        .ok_or_else(|| {
            EngineError::InvariantViolation(format!(
                "{} was routed with no ready task to work",
                profile.role
            ))
        })?;
    let task_id = task.id.clone();

    state.mark_task(&task_id, TaskStatus::InProgress, None, cx.clock.now())?;
    publish_task(state, cx, &task_id).await;

    let prompt = state_digest(state, state.task(&task_id));
    cx.sink.llm_call_begin(profile.role).await;
    let inference = cx.llm.infer(profile.system_prompt, &prompt).await;
    cx.sink
        .llm_call_end(profile.role, inference.latency_ms, inference.cached)
        .await;

    let decision = inference.decision;

    // A fallback or an explicit no-progress decision cannot advance the
    // task; record a blocker instead of looping on it.
    if inference.fallback
        || (decision.tools.is_empty() && decision.task_status == DecisionStatus::Pending)
    {
        let why = if inference.fallback {
            decision.reasoning.clone()
        } else {
            "Agent made no actionable decision".to_string()
        };
        return fail_task(profile, state, cx, &task_id, &why, &decision).await;
    }

    if decision.tools.len() > 1 {
        warn!(agent = %profile.role, requested = decision.tools.len(),
            "Multiple tools requested, executing only the first");
        cx.sink
            .log(
                Some(profile.role),
                format!(
                    "Requested {} tools in one step; only the first is executed",
                    decision.tools.len()
                ),
            )
            .await;
    }

    let mut completion_note: Option<String> = None;
    if let Some(call) = decision.tools.first() {
        let mut call = call.clone();
        if !profile.is_authorized(&call.tool) {
            let why = format!("Tool {} is not authorized for {}", call.tool, profile.role);
            return fail_task(profile, state, cx, &task_id, &why, &decision).await;
        }

        adjust_call(profile.role, &mut call, state, cx).await;

        let result = cx.registry.invoke(&call.tool, &call.params).await;
        cx.sink
            .tool_execution(profile.role, &call.tool, &call.params, &result)
            .await;

        match result {
            Err(err) => {
                let why = format!("{} failed: {err}", call.tool);
                return fail_task(profile, state, cx, &task_id, &why, &decision).await;
            }
            Ok(payload) => {
                if let Some(why) = semantic_failure(&payload) {
                    return fail_task(profile, state, cx, &task_id, &why, &decision).await;
                }
                completion_note = Some(after_tool(profile.role, &call, &payload, state, cx).await);
            }
        }
    }

    if decision.task_status == DecisionStatus::Failed {
        let why = format!("Agent reported failure: {}", decision.reasoning);
        return fail_task(profile, state, cx, &task_id, &why, &decision).await;
    }

    let summary = completion_note.unwrap_or_else(|| {
        if decision.reasoning.is_empty() {
            "Completed".to_string()
        } else {
            format!("Completed: {}", decision.reasoning)
        }
    });
    state.mark_task(&task_id, TaskStatus::Completed, Some(summary), cx.clock.now())?;
    publish_task(state, cx, &task_id).await;

    record_turn(profile, state, cx, &decision, "completed the task");
    refresh_next_actions(state);
    Ok(())
}

/// Mark the current task failed, record the blocker, and stop the step.
async fn fail_task(
    profile: &WorkerProfile,
    state: &mut WorkflowState,
    cx: &AgentContext,
    task_id: &str,
    why: &str,
    decision: &AgentDecision,
) -> Result<(), EngineError> {
    info!(agent = %profile.role, task = %task_id, why, "Task failed, blocking workflow");
    state.mark_task(
        task_id,
        TaskStatus::Failed,
        Some(format!("Failed: {why}")),
        cx.clock.now(),
    )?;
    publish_task(state, cx, task_id).await;

    state.add_blocker(why, profile.role, cx.clock.now());
    state.next_actions.clear();
    record_turn(profile, state, cx, decision, "blocked the workflow");
    Ok(())
}

/// Role-specific pre-invocation adjustment.
///
/// The advisor must not announce a terminal outcome it cannot see in the
/// state: notification copy claiming an opened account is downgraded to
/// an in-progress update unless `outcome` carries an account number.
async fn adjust_call(role: AgentRole, call: &mut ToolCall, state: &WorkflowState, cx: &AgentContext) {
    if role != AgentRole::Advisor || call.tool != "send_notification" {
        return;
    }
    let claims_terminal = call
        .params
        .get("type")
        .and_then(Value::as_str)
        .map(|t| t == "account_opened")
        .unwrap_or(false)
        || call
            .params
            .get("content")
            .and_then(Value::as_str)
            .map(|c| {
                let lower = c.to_lowercase();
                lower.contains("opened") || lower.contains("created")
            })
            .unwrap_or(false);

    let verified = state.outcome.get("account_number").is_some();
    if claims_terminal && !verified {
        warn!("Downgrading terminal notification: outcome not yet recorded");
        cx.sink
            .log(
                Some(role),
                "Notification claimed a terminal outcome without a recorded result; downgraded",
            )
            .await;
        call.params
            .insert("type".into(), Value::String("status_update".into()));
        call.params.insert(
            "content".into(),
            Value::String(
                "Your request is in progress; we will confirm as soon as it completes.".into(),
            ),
        );
    }
}

/// Role-specific post-invocation bookkeeping. Returns the task result
/// summary.
async fn after_tool(
    role: AgentRole,
    call: &ToolCall,
    payload: &ToolOutput,
    state: &mut WorkflowState,
    cx: &AgentContext,
) -> String {
    match call.tool.as_str() {
        "open_account" => {
            let account_number = payload
                .get("account_number")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            let mut outcome = ToolOutput::new();
            for key in ["account_number", "account_type", "status", "created_at"] {
                if let Some(value) = payload.get(key) {
                    outcome.insert(key.into(), value.clone());
                }
            }
            if let Some(client_id) = call.params.get("client_id") {
                outcome.insert("client_id".into(), client_id.clone());
            }
            state.set_outcome(outcome, cx.clock.now());
            cx.sink
                .success(role, format!("Account created successfully: {account_number}"))
                .await;
            format!("Opened account {account_number}")
        }
        "send_notification" => {
            let client_id = call
                .params
                .get("client_id")
                .and_then(Value::as_str)
                .unwrap_or("");
            let kind = payload.get("type").and_then(Value::as_str).unwrap_or("");
            let content = payload.get("content").and_then(Value::as_str).unwrap_or("");
            cx.sink.notification(client_id, kind, content).await;
            format!("Notification sent ({kind})")
        }
        "check_eligibility" => payload
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or("Eligibility confirmed")
            .to_string(),
        "validate_document" => "Document validation passed".to_string(),
        other => format!("Completed via {other}"),
    }
}

/// Tool succeeded, but the answer itself is a refusal.
fn semantic_failure(payload: &ToolOutput) -> Option<String> {
    if payload.get("eligible").and_then(Value::as_bool) == Some(false) {
        let reason = payload
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or("Eligibility check failed");
        return Some(format!("Eligibility failed: {reason}"));
    }
    if payload.get("valid").and_then(Value::as_bool) == Some(false) {
        let errors = payload
            .get("errors")
            .and_then(Value::as_array)
            .map(|errs| {
                errs.iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .filter(|joined| !joined.is_empty())
            .unwrap_or_else(|| "Validation failed".to_string());
        return Some(format!("Document validation failed: {errors}"));
    }
    None
}

fn record_turn(
    profile: &WorkerProfile,
    state: &mut WorkflowState,
    cx: &AgentContext,
    decision: &AgentDecision,
    what: &str,
) {
    let now = cx.clock.now();
    let reasoning = if decision.reasoning.is_empty() {
        "No reasoning provided".to_string()
    } else {
        decision.reasoning.clone()
    };
    state.append_decision(
        profile.role,
        format!("{} {}", profile.role, what),
        reasoning.clone(),
        now,
    );
    state.append_message(profile.role, reasoning, "analysis", now);
    if let Some(message) = &decision.message_to_client {
        state.append_message(profile.role, message.clone(), "client_communication", now);
    }
}

/// Point the router hint at the next ready task, if any.
fn refresh_next_actions(state: &mut WorkflowState) {
    state.next_actions = state
        .ready_tasks()
        .first()
        .map(|task| NextAction {
            agent: task.owner,
            action: task.description.clone(),
            priority: task.priority,
        })
        .into_iter()
        .collect();
}

async fn publish_task(state: &WorkflowState, cx: &AgentContext, task_id: &str) {
    if let Some(task) = state.task(task_id) {
        cx.sink.task_update(task).await;
    }
}
