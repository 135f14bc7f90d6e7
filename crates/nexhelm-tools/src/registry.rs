//! Tool registry.
//!
//! Tools implement the [`Tool`] trait (name, description, invoke) and are
//! registered by name. The registry is the choke point where the
//! error-sealing rule is enforced: a backend failure must surface as a
//! [`ToolError`], never ride inside a success payload. Any `Ok` payload
//! still carrying an `error` field is re-tagged before it escapes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ToolError;

/// JSON object carried by tool calls and results.
pub type ToolOutput = Map<String, Value>;

/// A named operation against a backend.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name as agents reference it.
    fn name(&self) -> &str;

    /// One-line description, used when listing authorized tools in prompts.
    fn description(&self) -> &str;

    /// Execute with JSON parameters.
    async fn invoke(&self, params: &ToolOutput) -> Result<ToolOutput, ToolError>;
}

/// Registry of tools keyed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Invoke a tool by name.
    ///
    /// On success the payload carries the tool-specific fields plus
    /// `success: true`.
    pub async fn invoke(&self, name: &str, params: &ToolOutput) -> Result<ToolOutput, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(format!("Unknown tool: {name}")))?;

        debug!(tool = %name, "Invoking tool");
        let payload = tool.invoke(params).await?;
        let mut payload = seal(name, payload)?;
        payload.insert("success".into(), Value::Bool(true));
        Ok(payload)
    }

    /// Registered tool names, sorted.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// `(name, description)` pairs for building prompt tool listings.
    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .tools
            .values()
            .map(|tool| (tool.name().to_string(), tool.description().to_string()))
            .collect();
        pairs.sort();
        pairs
    }
}

/// Re-tag payloads that smuggle an error through a success path.
fn seal(name: &str, payload: ToolOutput) -> Result<ToolOutput, ToolError> {
    if let Some(error) = payload.get("error") {
        let message = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        warn!(tool = %name, %message, "Backend error inside success payload, re-tagging");
        return Err(if message.contains("already") {
            ToolError::Conflict(message)
        } else {
            ToolError::Internal(message)
        });
    }
    Ok(payload)
}
