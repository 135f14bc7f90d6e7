//! End-to-end scenarios over the full engine: scripted adapter, seeded
//! backends, real executor, real bus.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use nexhelm_bus::{Event, EventType};
use nexhelm_llm::{CachedAdapter, LLMAdapter, LLMError, LLMMessage, LLMResponse, ScriptedAdapter};
use nexhelm_tools::{Backends, ClientRecord, Clock, FixedClock};

use crate::engine::{EngineConfig, WorkflowEngine};
use crate::types::RequestSpec;

fn doc(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Seed a client with CRM record and the standard document set.
fn seed_client(backends: &Backends, client_id: &str, income: u64, application_signed: bool) {
    backends.crm.seed_client(
        client_id,
        ClientRecord {
            name: format!("Client {client_id}"),
            age: 35,
            email: format!("{client_id}@example.com"),
            income,
            existing_accounts: vec![],
        },
    );
    backends.documents.seed_document(
        client_id,
        "drivers_license",
        doc(json!({"status": "valid", "uploaded": true, "verified": true})),
    );
    backends.documents.seed_document(
        client_id,
        "tax_return_2023",
        doc(json!({"status": "valid", "income": income, "year": 2023})),
    );
    backends.documents.seed_document(
        client_id,
        "ira_application",
        doc(json!({
            "status": "valid",
            "signature_complete": application_signed,
            "submitted": true,
        })),
    );
}

fn engine_with(backends: Backends) -> WorkflowEngine {
    WorkflowEngine::new(backends, Arc::new(ScriptedAdapter::new()))
        .with_clock(Arc::new(FixedClock::default()))
}

async fn run_to_completion(engine: &WorkflowEngine, spec: RequestSpec) -> Vec<Event> {
    let handle = engine.start(spec).await;
    handle.events.collect_all().await
}

fn terminal_payload(events: &[Event]) -> &Value {
    let last = events.last().expect("stream must not be empty");
    assert_eq!(last.event_type, EventType::WorkflowComplete);
    &last.payload
}

fn tool_events<'a>(events: &'a [Event], tool: &str) -> Vec<&'a Event> {
    events
        .iter()
        .filter(|e| {
            e.event_type == EventType::ToolExecution && e.payload["tool"].as_str() == Some(tool)
        })
        .collect()
}

/// Replay task updates and check the per-task transition discipline and
/// the single-in-progress rule.
fn check_task_invariants(events: &[Event]) {
    let mut statuses: HashMap<String, String> = HashMap::new();
    let mut in_progress = 0usize;

    for event in events {
        if event.event_type != EventType::TaskUpdate {
            continue;
        }
        let task_id = event.payload["task_id"].as_str().unwrap().to_string();
        let status = event.payload["status"].as_str().unwrap().to_string();
        let previous = statuses.get(&task_id).cloned();

        let legal = match (previous.as_deref(), status.as_str()) {
            (None, "pending") | (None, "in_progress") => true,
            (Some("pending"), "in_progress") | (Some("pending"), "skipped") => true,
            (Some("in_progress"), "completed") | (Some("in_progress"), "failed") => true,
            (Some(prev), next) => prev == next,
            (None, _) => false,
        };
        assert!(
            legal,
            "illegal transition for {task_id}: {previous:?} -> {status}"
        );

        if status == "in_progress" {
            in_progress += 1;
            assert!(in_progress <= 1, "more than one task in progress");
        }
        if previous.as_deref() == Some("in_progress") {
            in_progress -= 1;
        }
        statuses.insert(task_id, status);
    }
}

/// No successful tool execution may carry an error inside its payload.
fn check_error_sealing(events: &[Event]) {
    for event in events {
        if event.event_type != EventType::ToolExecution {
            continue;
        }
        if event.payload["result"]["kind"] == json!("ok") {
            assert!(
                event.payload["result"]["payload"].get("error").is_none(),
                "ok result carries a nested error: {:?}",
                event.payload
            );
        }
    }
}

// Happy path for a new, eligible, fully documented client.
#[tokio::test]
async fn test_happy_path_opens_account() {
    let backends = Backends::new();
    seed_client(&backends, "c1", 120_000, true);
    let engine = engine_with(backends);

    let events = run_to_completion(&engine, RequestSpec::new("open_roth_ira", "c1")).await;

    assert_eq!(events[0].event_type, EventType::WorkflowStart);
    let payload = terminal_payload(&events);
    assert_eq!(payload["status"], json!("completed"));
    assert_eq!(payload["tasks_completed"], payload["total_tasks"]);

    let account_number = payload["outcome"]["account_number"].as_str().unwrap();
    assert!(account_number.starts_with("ROTH_IRA-"));
    let ordinal: u64 = account_number
        .rsplit('-')
        .next()
        .unwrap()
        .parse()
        .unwrap();
    assert!(ordinal >= 1000);

    // The plan covered the critical steps.
    let descriptions: Vec<String> = events
        .iter()
        .filter(|e| e.event_type == EventType::TaskUpdate)
        .map(|e| e.payload["description"].as_str().unwrap().to_lowercase())
        .collect();
    for needle in ["eligibility", "form", "validate", "account", "notify"] {
        assert!(
            descriptions.iter().any(|d| d.contains(needle)),
            "no task mentions {needle}"
        );
    }

    // The backend now holds exactly one Roth IRA for the client.
    assert_eq!(engine.backends().accounts.accounts_for("c1").len(), 1);
    // The client was notified with terminal phrasing.
    let notifications = engine.backends().notifier.sent_to("c1");
    assert!(notifications.iter().any(|n| n.kind == "account_opened"));

    check_task_invariants(&events);
    check_error_sealing(&events);
}

// A duplicate account surfaces as a conflict and blocks the workflow.
#[tokio::test]
async fn test_duplicate_account_blocks() {
    let backends = Backends::new();
    seed_client(&backends, "c2", 120_000, true);
    let existing = backends
        .accounts
        .open_account("c2", "roth_ira", FixedClock::default().now())
        .unwrap();
    let engine = engine_with(backends);

    let events = run_to_completion(&engine, RequestSpec::new("open_roth_ira", "c2")).await;

    let payload = terminal_payload(&events);
    assert_eq!(payload["status"], json!("blocked"));
    assert!(payload["outcome"].as_object().unwrap().is_empty());

    let blockers = payload["blockers"].as_array().unwrap();
    assert!(blockers.iter().any(|b| {
        let text = b.as_str().unwrap();
        text.contains("already has a roth_ira account") && text.contains(&existing.account_number)
    }));

    // The conflict is visible on the wire as a structured failure.
    let opens = tool_events(&events, "open_account");
    assert_eq!(opens.len(), 1);
    assert_eq!(opens[0].payload["result"]["kind"], json!("conflict"));

    // No second account was created.
    assert_eq!(engine.backends().accounts.accounts_for("c2").len(), 1);
    check_error_sealing(&events);
}

// Ineligible income blocks after the eligibility check; nothing
// downstream runs.
#[tokio::test]
async fn test_ineligible_client_blocks_early() {
    let backends = Backends::new();
    seed_client(&backends, "c3", 500_000, true);
    let engine = engine_with(backends);

    let events = run_to_completion(&engine, RequestSpec::new("open_roth_ira", "c3")).await;

    let payload = terminal_payload(&events);
    assert_eq!(payload["status"], json!("blocked"));
    assert!(payload["blockers"]
        .as_array()
        .unwrap()
        .iter()
        .any(|b| b.as_str().unwrap().contains("Eligibility failed")));

    assert!(tool_events(&events, "open_account").is_empty());
    assert!(tool_events(&events, "validate_document").is_empty());
    assert!(engine.backends().accounts.accounts_for("c3").is_empty());
}

// Invalid documents block at validation; the account step never runs.
#[tokio::test]
async fn test_invalid_document_blocks_before_account() {
    let backends = Backends::new();
    seed_client(&backends, "c4", 120_000, false);
    let engine = engine_with(backends);

    let events = run_to_completion(&engine, RequestSpec::new("open_roth_ira", "c4")).await;

    let payload = terminal_payload(&events);
    assert_eq!(payload["status"], json!("blocked"));
    assert!(payload["blockers"]
        .as_array()
        .unwrap()
        .iter()
        .any(|b| b.as_str().unwrap().contains("Document validation failed")));

    assert!(tool_events(&events, "open_account").is_empty());
    assert!(engine.backends().accounts.accounts_for("c4").is_empty());
}

/// Planner that forgets the account-creation step; worker decisions
/// delegate to the scripted adapter.
struct ForgetfulPlanner {
    inner: ScriptedAdapter,
}

#[async_trait]
impl LLMAdapter for ForgetfulPlanner {
    fn provider(&self) -> &str {
        "forgetful"
    }
    fn model(&self) -> &str {
        "forgetful-v1"
    }
    async fn generate(&self, messages: &[LLMMessage]) -> Result<LLMResponse, LLMError> {
        let prompt: String = messages.iter().map(|m| m.content.as_str()).collect();
        if !prompt.contains("workflow plan") {
            return self.inner.generate(messages).await;
        }
        let plan = json!({
            "reasoning": "Planned IRA workflow",
            "workflow_plan": { "tasks": [
                {"id": "task_1", "description": "Verify IRA income eligibility",
                 "owner": "operations_agent", "dependencies": [], "priority": "high"},
                {"id": "task_2", "description": "Send IRA application form to client",
                 "owner": "advisor_agent", "dependencies": ["task_1"], "priority": "high"},
                {"id": "task_3", "description": "Review and validate submitted IRA application",
                 "owner": "operations_agent", "dependencies": ["task_2"], "priority": "high"},
                {"id": "task_4", "description": "Notify client of successful account opening",
                 "owner": "advisor_agent", "dependencies": ["task_3"], "priority": "high"},
            ]}
        });
        Ok(LLMResponse::text(plan.to_string(), "forgetful-v1"))
    }
}

// The validator injects the missing account-creation task and the
// workflow completes as the happy path.
#[tokio::test]
async fn test_validator_injects_account_task() {
    let backends = Backends::new();
    seed_client(&backends, "c5", 120_000, true);
    let engine = WorkflowEngine::new(
        backends,
        Arc::new(ForgetfulPlanner {
            inner: ScriptedAdapter::new(),
        }),
    )
    .with_clock(Arc::new(FixedClock::default()));

    let events = run_to_completion(&engine, RequestSpec::new("open_roth_ira", "c5")).await;

    // The published plan includes a synthetic account-creation task owned
    // by operations.
    let account_task = events
        .iter()
        .filter(|e| e.event_type == EventType::TaskUpdate)
        .find(|e| {
            let description = e.payload["description"].as_str().unwrap().to_lowercase();
            description.contains("create") && description.contains("account")
        })
        .expect("validator should have injected an account task");
    assert_eq!(account_task.payload["owner"], json!("operations_agent"));

    let payload = terminal_payload(&events);
    assert_eq!(payload["status"], json!("completed"));
    assert!(payload["outcome"]["account_number"]
        .as_str()
        .unwrap()
        .starts_with("ROTH_IRA-"));
    assert_eq!(engine.backends().accounts.accounts_for("c5").len(), 1);
    check_task_invariants(&events);
}

// Concurrent workflows stay independent and get distinct accounts.
#[tokio::test]
async fn test_concurrent_workflows_independent() {
    let backends = Backends::new();
    seed_client(&backends, "c5", 120_000, true);
    seed_client(&backends, "c6", 120_000, true);
    let engine = engine_with(backends);

    let handle_a = engine.start(RequestSpec::new("open_roth_ira", "c5")).await;
    let handle_b = engine.start(RequestSpec::new("open_roth_ira", "c6")).await;
    let id_a = handle_a.workflow_id.clone();
    let id_b = handle_b.workflow_id.clone();

    let (events_a, events_b) =
        tokio::join!(handle_a.events.collect_all(), handle_b.events.collect_all());

    assert!(events_a.iter().all(|e| e.workflow_id == id_a.as_str()));
    assert!(events_b.iter().all(|e| e.workflow_id == id_b.as_str()));

    let outcome_a = terminal_payload(&events_a)["outcome"]["account_number"]
        .as_str()
        .unwrap()
        .to_string();
    let outcome_b = terminal_payload(&events_b)["outcome"]["account_number"]
        .as_str()
        .unwrap()
        .to_string();
    assert_ne!(outcome_a, outcome_b);

    check_task_invariants(&events_a);
    check_task_invariants(&events_b);
}

/// Adapter whose every call fails; planning falls back to the template
/// and the first worker turn records a blocker.
struct Unavailable;

#[async_trait]
impl LLMAdapter for Unavailable {
    fn provider(&self) -> &str {
        "unavailable"
    }
    fn model(&self) -> &str {
        "unavailable-v1"
    }
    async fn generate(&self, _messages: &[LLMMessage]) -> Result<LLMResponse, LLMError> {
        Err(LLMError::ConnectionError("simulated outage".into()))
    }
}

#[tokio::test]
async fn test_llm_outage_blocks_instead_of_looping() {
    let backends = Backends::new();
    seed_client(&backends, "c1", 120_000, true);
    let engine = WorkflowEngine::new(backends, Arc::new(Unavailable))
        .with_clock(Arc::new(FixedClock::default()));

    let events = run_to_completion(&engine, RequestSpec::new("open_roth_ira", "c1")).await;

    // The fallback template still planned the workflow.
    let planned = events
        .iter()
        .filter(|e| e.event_type == EventType::TaskUpdate)
        .count();
    assert!(planned >= 5);

    let payload = terminal_payload(&events);
    assert_eq!(payload["status"], json!("blocked"));
    assert!(payload["blockers"]
        .as_array()
        .unwrap()
        .iter()
        .any(|b| b.as_str().unwrap().contains("LLM")));
}

// The step budget bounds agent invocations; exhausting it fails the
// workflow with a blocker.
#[tokio::test]
async fn test_step_budget_exhaustion_fails() {
    let backends = Backends::new();
    seed_client(&backends, "c1", 120_000, true);
    let engine = WorkflowEngine::with_config(
        backends,
        Arc::new(ScriptedAdapter::new()),
        EngineConfig {
            max_steps: 2,
            ..EngineConfig::default()
        },
    )
    .with_clock(Arc::new(FixedClock::default()));

    let events = run_to_completion(&engine, RequestSpec::new("open_roth_ira", "c1")).await;

    let payload = terminal_payload(&events);
    assert_eq!(payload["status"], json!("failed"));
    assert!(payload["blockers"]
        .as_array()
        .unwrap()
        .iter()
        .any(|b| b.as_str().unwrap().contains("Step budget exhausted")));
}

/// Scripted adapter with a delay, so cancellation lands mid-run.
struct SlowScripted {
    inner: ScriptedAdapter,
}

#[async_trait]
impl LLMAdapter for SlowScripted {
    fn provider(&self) -> &str {
        "slow-scripted"
    }
    fn model(&self) -> &str {
        "slow-scripted-v1"
    }
    async fn generate(&self, messages: &[LLMMessage]) -> Result<LLMResponse, LLMError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.inner.generate(messages).await
    }
}

#[tokio::test]
async fn test_cancellation_fails_workflow_and_closes_stream() {
    let backends = Backends::new();
    seed_client(&backends, "c1", 120_000, true);
    let engine = WorkflowEngine::new(
        backends,
        Arc::new(SlowScripted {
            inner: ScriptedAdapter::new(),
        }),
    )
    .with_clock(Arc::new(FixedClock::default()));

    let handle = engine.start(RequestSpec::new("open_roth_ira", "c1")).await;
    engine.cancel(&handle.workflow_id).await.unwrap();

    let events = handle.events.collect_all().await;
    let payload = terminal_payload(&events);
    assert_eq!(payload["status"], json!("failed"));
    assert!(payload["blockers"]
        .as_array()
        .unwrap()
        .iter()
        .any(|b| b.as_str().unwrap() == "cancelled"));
    assert!(payload["outcome"].as_object().unwrap().is_empty());

    // Unknown workflows cannot be cancelled.
    assert!(engine.cancel(&"wf-missing".into()).await.is_err());
}

/// Plans a lone notification task and then, adversarially, claims the
/// account is already open even though nothing recorded an outcome.
struct OverconfidentNotifier;

#[async_trait]
impl LLMAdapter for OverconfidentNotifier {
    fn provider(&self) -> &str {
        "overconfident"
    }
    fn model(&self) -> &str {
        "overconfident-v1"
    }
    async fn generate(&self, messages: &[LLMMessage]) -> Result<LLMResponse, LLMError> {
        let prompt: String = messages.iter().map(|m| m.content.as_str()).collect();
        let body = if prompt.contains("workflow plan") {
            json!({
                "reasoning": "Status update only",
                "workflow_plan": { "tasks": [
                    {"id": "task_1", "description": "Update client on account opening progress",
                     "owner": "advisor_agent", "dependencies": [], "priority": "high"},
                ]}
            })
        } else {
            json!({
                "reasoning": "The account must be open by now",
                "tools": [{"tool": "send_notification",
                           "params": {"client_id": "c1", "type": "account_opened",
                                      "content": "Great news! Your account has been opened."}}],
                "task_status": "completed",
                "message_to_client": null,
            })
        };
        Ok(LLMResponse::text(body.to_string(), "overconfident-v1"))
    }
}

#[tokio::test]
async fn test_advisor_downgrades_unverified_terminal_notification() {
    let backends = Backends::new();
    seed_client(&backends, "c1", 120_000, true);
    let engine = WorkflowEngine::new(backends, Arc::new(OverconfidentNotifier))
        .with_clock(Arc::new(FixedClock::default()));

    // The request family avoids the validator's account rule so the plan
    // stays a single notification task.
    let events = run_to_completion(&engine, RequestSpec::new("status_inquiry", "c1")).await;

    let payload = terminal_payload(&events);
    assert_eq!(payload["status"], json!("completed"));

    // The model claimed "account_opened"; the advisor downgraded it.
    let notifications = engine.backends().notifier.sent_to("c1");
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, "status_update");
    assert!(!notifications[0].content.to_lowercase().contains("opened"));
}

// Caching is transparent: a second identical workflow reuses responses
// and still completes.
#[tokio::test]
async fn test_cached_adapter_preserves_semantics() {
    let backends = Backends::new();
    seed_client(&backends, "c1", 120_000, true);
    seed_client(&backends, "c6", 120_000, true);
    let engine = WorkflowEngine::new(
        backends,
        Arc::new(CachedAdapter::new(ScriptedAdapter::new())),
    )
    .with_clock(Arc::new(FixedClock::default()));

    let first = run_to_completion(&engine, RequestSpec::new("open_roth_ira", "c1")).await;
    assert_eq!(terminal_payload(&first)["status"], json!("completed"));

    let second = run_to_completion(&engine, RequestSpec::new("open_roth_ira", "c6")).await;
    let payload = terminal_payload(&second);
    assert_eq!(payload["status"], json!("completed"));
    // Distinct clients still get distinct accounts even with caching.
    assert_ne!(
        terminal_payload(&first)["outcome"]["account_number"],
        payload["outcome"]["account_number"]
    );
}
