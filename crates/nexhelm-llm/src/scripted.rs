//! Deterministic scripted adapter.
//!
//! Produces the same structured decisions a well-behaved model would,
//! derived entirely from labeled lines in the prompt (`Request Type:`,
//! `Client ID:`, `Current Task:`, `Outcome:`). Tests and demos run the
//! full engine against it without any network access.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::error::LLMError;
use crate::traits::{LLMAdapter, LLMMessage, LLMResponse};

/// A scripted stand-in for a planning/decision model.
#[derive(Debug, Default)]
pub struct ScriptedAdapter;

impl ScriptedAdapter {
    pub fn new() -> Self {
        Self
    }

    fn respond(&self, prompt: &str) -> String {
        let request_type = field(prompt, "Request Type:").unwrap_or_default();
        let client_id = field(prompt, "Client ID:").unwrap_or_default();

        if prompt.contains("workflow plan") {
            return plan_response(&request_type);
        }

        let task = field(prompt, "Current Task:").unwrap_or_default();
        let description = task
            .split_once(':')
            .map(|(_, rest)| rest.trim().to_string())
            .unwrap_or(task);
        let outcome = field(prompt, "Outcome:");
        decision_response(&description, &request_type, &client_id, outcome.as_deref())
    }
}

#[async_trait]
impl LLMAdapter for ScriptedAdapter {
    fn provider(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-v1"
    }

    async fn generate(&self, messages: &[LLMMessage]) -> Result<LLMResponse, LLMError> {
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        debug!(chars = prompt.len(), "Scripting response");
        Ok(LLMResponse::text(self.respond(&prompt), "scripted-v1"))
    }
}

/// First value following a `Label:` line prefix anywhere in the prompt.
fn field(prompt: &str, label: &str) -> Option<String> {
    prompt.lines().find_map(|line| {
        line.trim()
            .strip_prefix(label)
            .map(|rest| rest.trim().to_string())
    })
}

fn account_type(request_type: &str) -> &'static str {
    let lower = request_type.to_lowercase();
    if lower.contains("roth") {
        "roth_ira"
    } else if lower.contains("ira") {
        "traditional_ira"
    } else {
        "brokerage"
    }
}

fn plan_response(request_type: &str) -> String {
    let lower = request_type.to_lowercase();
    let tasks = if lower.contains("ira") {
        json!([
            {
                "id": "task_1",
                "description": "Verify IRA income eligibility and regulatory requirements",
                "owner": "operations_agent",
                "dependencies": [],
                "priority": "high",
            },
            {
                "id": "task_2",
                "description": "Send personalized IRA application form to client",
                "owner": "advisor_agent",
                "dependencies": ["task_1"],
                "priority": "high",
            },
            {
                "id": "task_3",
                "description": "Review and validate submitted IRA application for completeness",
                "owner": "operations_agent",
                "dependencies": ["task_2"],
                "priority": "high",
            },
            {
                "id": "task_4",
                "description": "Open IRA account in system and generate account number",
                "owner": "operations_agent",
                "dependencies": ["task_3"],
                "priority": "high",
            },
            {
                "id": "task_5",
                "description": "Notify client of successful account opening and next steps",
                "owner": "advisor_agent",
                "dependencies": ["task_4"],
                "priority": "high",
            },
        ])
    } else {
        json!([
            {
                "id": "task_1",
                "description": format!("Analyze and process {request_type} request"),
                "owner": "operations_agent",
                "dependencies": [],
                "priority": "high",
            },
            {
                "id": "task_2",
                "description": format!("Complete {request_type} workflow and update the client"),
                "owner": "advisor_agent",
                "dependencies": ["task_1"],
                "priority": "high",
            },
        ])
    };

    json!({
        "reasoning": format!("Planned standard task sequence for {request_type}"),
        "workflow_plan": { "tasks": tasks },
    })
    .to_string()
}

fn decision_response(
    description: &str,
    request_type: &str,
    client_id: &str,
    outcome: Option<&str>,
) -> String {
    let lower = description.to_lowercase();
    let account = account_type(request_type);

    let (reasoning, tools, message_to_client) = if lower.contains("eligib") {
        (
            "Verifying product eligibility against the client's filed income".to_string(),
            json!([{ "tool": "check_eligibility",
                     "params": { "client_id": client_id, "product_type": account } }]),
            None,
        )
    } else if lower.contains("validat") || lower.contains("review") {
        (
            "Checking the submitted application for completeness".to_string(),
            json!([{ "tool": "validate_document",
                     "params": { "client_id": client_id, "doc_type": "ira_application" } }]),
            None,
        )
    } else if lower.contains("notif") {
        let opened = outcome.map_or(false, |o| o.contains("account_number"));
        let content = if opened {
            "Great news! Your new account has been opened and is active."
        } else {
            "Your application is in progress; we will confirm as soon as your account is ready."
        };
        (
            "Updating the client on the workflow outcome".to_string(),
            json!([{ "tool": "send_notification",
                     "params": { "client_id": client_id,
                                 "type": if opened { "account_opened" } else { "status_update" },
                                 "content": content } }]),
            Some(content.to_string()),
        )
    } else if lower.contains("form") || lower.contains("application") {
        (
            "Sending the pre-filled application form to the client".to_string(),
            json!([{ "tool": "send_notification",
                     "params": { "client_id": client_id,
                                 "type": "form_sent",
                                 "content": "Your application form is on its way; please review and sign." } }]),
            Some("Your application form is on its way; please review and sign.".to_string()),
        )
    } else if (lower.contains("open") || lower.contains("create")) && lower.contains("account") {
        (
            "All prerequisites satisfied; creating the account".to_string(),
            json!([{ "tool": "open_account",
                     "params": { "client_id": client_id, "account_type": account } }]),
            None,
        )
    } else {
        (
            format!("No tool applies to: {description}"),
            json!([]),
            None,
        )
    };

    json!({
        "reasoning": reasoning,
        "tools": tools,
        "task_status": "completed",
        "message_to_client": message_to_client,
    })
    .to_string()
}
