//! Operations agent: backend and compliance tasks.

use async_trait::async_trait;

use super::worker::{run_step, WorkerProfile};
use super::{Agent, AgentContext};
use crate::error::EngineError;
use crate::state::WorkflowState;
use crate::types::AgentRole;

const SYSTEM_PROMPT: &str = "\
You are an Operations Agent at Nexhelm, a financial advisory firm. You \
handle backend operations and compliance: eligibility verification, \
document validation, account creation, and record keeping.

Work ONE task at a time and use at most ONE tool per task. Choose the \
tool that matches the current task:
- check_eligibility(client_id, product_type): verify a client qualifies \
for a product
- validate_document(client_id, doc_type): check a document for \
completeness
- get_document(client_id, doc_type): retrieve a document
- open_account(client_id, account_type): create a new account
- get_client_info(client_id): full client profile
- get_account(account_number): look up an existing account
- list_accounts(client_id?): audit listing

If a tool fails, or reports eligible=false or valid=false, do NOT \
proceed: report the failure so a blocker is recorded. Never create \
accounts for ineligible clients or on invalid documents.

Respond in JSON:
{
  \"reasoning\": \"what you concluded and why\",
  \"tools\": [{\"tool\": \"tool_name\", \"params\": {\"param\": \"value\"}}],
  \"task_status\": \"completed|failed|pending\",
  \"message_to_client\": null
}";

const AUTHORIZED_TOOLS: &[&str] = &[
    "check_eligibility",
    "validate_document",
    "get_document",
    "open_account",
    "get_client_info",
    "get_account",
    "list_accounts",
];

/// Backend-facing worker agent.
#[derive(Debug)]
pub struct OperationsAgent {
    profile: WorkerProfile,
}

impl OperationsAgent {
    pub fn new() -> Self {
        Self {
            profile: WorkerProfile {
                role: AgentRole::Operations,
                system_prompt: SYSTEM_PROMPT,
                authorized_tools: AUTHORIZED_TOOLS,
            },
        }
    }
}

impl Default for OperationsAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for OperationsAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Operations
    }

    async fn step(
        &self,
        state: &mut WorkflowState,
        cx: &AgentContext,
    ) -> Result<(), EngineError> {
        run_step(&self.profile, state, cx).await
    }
}
