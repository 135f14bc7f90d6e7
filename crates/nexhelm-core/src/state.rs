//! The shared workflow state document.
//!
//! Exactly one [`WorkflowState`] exists per workflow, owned exclusively
//! by its executor task. Agents mutate it only through the helpers here,
//! which enforce the task transition rules and the single-in-progress
//! invariant. The append-only collections (messages, decisions, blockers)
//! only ever grow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EngineError;
use crate::types::{AgentRole, Request, WorkflowId};

/// Workflow lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    InProgress,
    Blocked,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Blocked)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Blocked => "blocked",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    /// Allowed transitions: `pending -> in_progress -> {completed, failed}`
    /// or `pending -> skipped`.
    pub fn can_transition_to(&self, to: TaskStatus) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::InProgress)
                | (Self::Pending, Self::Skipped)
                | (Self::InProgress, Self::Completed)
                | (Self::InProgress, Self::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Task priority; routing prefers higher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    #[serde(alias = "medium")]
    Normal,
    High,
}

/// A unit of work within a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    pub owner: AgentRole,
    pub status: TaskStatus,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub result: Option<String>,
}

impl Task {
    pub fn new(id: impl Into<String>, description: impl Into<String>, owner: AgentRole) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            owner,
            status: TaskStatus::Pending,
            dependencies: Vec::new(),
            priority: Priority::default(),
            result: None,
        }
    }

    #[must_use]
    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Observational inter-agent message; never gates execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub from_agent: String,
    pub to_agent: String,
    pub timestamp: DateTime<Utc>,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Audit record of one agent turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub agent: String,
    pub timestamp: DateTime<Utc>,
    pub decision: String,
    pub reasoning: String,
}

/// A recorded impediment; any unresolved blocker forces `blocked`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blocker {
    pub description: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
}

/// Short-lived routing hint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextAction {
    pub agent: AgentRole,
    pub action: String,
    pub priority: Priority,
}

/// The single shared document a workflow mutates as it runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub workflow_id: WorkflowId,
    pub request: Request,
    pub status: WorkflowStatus,
    #[serde(default)]
    pub context: Map<String, Value>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
    #[serde(default)]
    pub decisions: Vec<DecisionRecord>,
    #[serde(default)]
    pub blockers: Vec<Blocker>,
    #[serde(default)]
    pub next_actions: Vec<NextAction>,
    #[serde(default)]
    pub outcome: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
    /// Create a fresh state for a request.
    pub fn new(workflow_id: WorkflowId, request: Request, now: DateTime<Utc>) -> Self {
        Self {
            workflow_id,
            request,
            status: WorkflowStatus::Pending,
            context: Map::new(),
            tasks: Vec::new(),
            messages: Vec::new(),
            decisions: Vec::new(),
            blockers: Vec::new(),
            next_actions: Vec::new(),
            outcome: Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Deep copy for observability; the executor keeps the original.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    /// Transition a task, enforcing the allowed transitions and the
    /// at-most-one-in-progress rule.
    pub fn mark_task(
        &mut self,
        task_id: &str,
        status: TaskStatus,
        result: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        if status == TaskStatus::InProgress
            && self.tasks.iter().any(|t| t.status == TaskStatus::InProgress)
        {
            return Err(EngineError::InvariantViolation(format!(
                "cannot start {task_id}: another task is already in progress"
            )));
        }

        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| EngineError::TaskNotFound(task_id.to_string()))?;

        if !task.status.can_transition_to(status) {
            return Err(EngineError::InvalidTransition {
                task_id: task.id.clone(),
                from: task.status,
                to: status,
            });
        }
        task.status = status;
        if result.is_some() {
            task.result = result;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Record a blocker and move the workflow to `blocked`.
    pub fn add_blocker(
        &mut self,
        description: impl Into<String>,
        created_by: AgentRole,
        now: DateTime<Utc>,
    ) {
        self.blockers.push(Blocker {
            description: description.into(),
            created_by: created_by.as_str().to_string(),
            created_at: now,
            resolved: false,
        });
        self.status = WorkflowStatus::Blocked;
        self.updated_at = now;
    }

    pub fn has_unresolved_blockers(&self) -> bool {
        self.blockers.iter().any(|b| !b.resolved)
    }

    pub fn append_message(
        &mut self,
        from: AgentRole,
        content: impl Into<String>,
        kind: impl Into<String>,
        now: DateTime<Utc>,
    ) {
        self.messages.push(MessageRecord {
            from_agent: from.as_str().to_string(),
            to_agent: "workflow_system".into(),
            timestamp: now,
            content: content.into(),
            kind: kind.into(),
        });
        self.updated_at = now;
    }

    pub fn append_decision(
        &mut self,
        agent: AgentRole,
        decision: impl Into<String>,
        reasoning: impl Into<String>,
        now: DateTime<Utc>,
    ) {
        self.decisions.push(DecisionRecord {
            agent: agent.as_str().to_string(),
            timestamp: now,
            decision: decision.into(),
            reasoning: reasoning.into(),
        });
        self.updated_at = now;
    }

    /// Merge fields into the outcome map.
    pub fn set_outcome(&mut self, fields: Map<String, Value>, now: DateTime<Utc>) {
        for (key, value) in fields {
            self.outcome.insert(key, value);
        }
        self.updated_at = now;
    }

    /// Ids and statuses for quick dependency checks.
    pub fn completed_task_ids(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .map(|t| t.id.as_str())
            .collect()
    }

    /// A pending task is ready when every dependency is completed.
    pub fn is_task_ready(&self, task: &Task) -> bool {
        task.status == TaskStatus::Pending
            && task.dependencies.iter().all(|dep| {
                self.task(dep)
                    .map(|t| t.status == TaskStatus::Completed)
                    .unwrap_or(false)
            })
    }

    /// Tasks that are ready to run, in task order.
    pub fn ready_tasks(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|t| self.is_task_ready(t)).collect()
    }

    /// First ready task owned by the given role, in task order.
    pub fn first_ready_task_for(&self, role: AgentRole) -> Option<&Task> {
        self.tasks
            .iter()
            .find(|t| t.owner == role && self.is_task_ready(t))
    }

    pub fn tasks_completed(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count()
    }
}
