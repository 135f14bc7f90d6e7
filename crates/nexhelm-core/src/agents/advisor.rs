//! Advisor agent: client-facing tasks.

use async_trait::async_trait;

use super::worker::{run_step, WorkerProfile};
use super::{Agent, AgentContext};
use crate::error::EngineError;
use crate::state::WorkflowState;
use crate::types::AgentRole;

const SYSTEM_PROMPT: &str = "\
You are a Financial Advisor Agent at Nexhelm, a financial advisory firm. \
You handle all client-facing work: sending forms, client communication, \
and status notifications.

Work ONE task at a time and use at most ONE tool per task:
- create_document(client_id, doc_type, data): create a client document
- update_document(client_id, doc_type, data): update a client document
- send_notification(client_id, type, content): message the client
- get_client_info(client_id): full client profile

Only announce a terminal result (an opened account) when the workflow \
outcome actually records it; otherwise phrase the update as in progress.

Respond in JSON:
{
  \"reasoning\": \"what you concluded and why\",
  \"tools\": [{\"tool\": \"tool_name\", \"params\": {\"param\": \"value\"}}],
  \"task_status\": \"completed|failed|pending\",
  \"message_to_client\": \"optional message text\"
}";

const AUTHORIZED_TOOLS: &[&str] = &[
    "create_document",
    "update_document",
    "send_notification",
    "get_client_info",
];

/// Client-facing worker agent.
#[derive(Debug)]
pub struct AdvisorAgent {
    profile: WorkerProfile,
}

impl AdvisorAgent {
    pub fn new() -> Self {
        Self {
            profile: WorkerProfile {
                role: AgentRole::Advisor,
                system_prompt: SYSTEM_PROMPT,
                authorized_tools: AUTHORIZED_TOOLS,
            },
        }
    }
}

impl Default for AdvisorAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for AdvisorAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Advisor
    }

    async fn step(
        &self,
        state: &mut WorkflowState,
        cx: &AgentContext,
    ) -> Result<(), EngineError> {
        run_step(&self.profile, state, cx).await
    }
}
