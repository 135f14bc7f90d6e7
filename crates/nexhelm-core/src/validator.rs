//! Task validator.
//!
//! A structural safety net over planned task graphs, run once after
//! planning. Rules state *what must exist* — "for request family F, a
//! task matching pattern P owned by role R" — never which tool to call.
//! A missing task is synthesized and spliced into the graph with ids
//! renumbered and dependencies rewired. Applying the validator twice
//! yields the same task list as applying it once.

use regex::Regex;
use tracing::info;

use crate::state::{Priority, Task};
use crate::types::{AgentRole, Request};

/// A structural requirement over the planned task list.
#[derive(Debug, Clone)]
pub struct ValidationRule {
    /// Matches the request family this rule applies to.
    pub request_pattern: Regex,
    /// The description pattern that must appear.
    pub description_pattern: Regex,
    /// The role that must own the matching task.
    pub owner: AgentRole,
    /// Description for the synthesized task; `{account_type}` is
    /// substituted from the request.
    pub synthetic_description: String,
}

/// Validates and augments planned task graphs.
#[derive(Debug, Clone)]
pub struct TaskValidator {
    rules: Vec<ValidationRule>,
}

impl TaskValidator {
    pub fn new(rules: Vec<ValidationRule>) -> Self {
        Self { rules }
    }

    /// The standard rule set: account-opening requests must plan an
    /// account-creation step owned by operations.
    pub fn standard() -> Self {
        Self::new(vec![ValidationRule {
            request_pattern: Regex::new("(?i)(ira|account)").expect("static pattern"),
            description_pattern: Regex::new("(?i)(open|create).*account").expect("static pattern"),
            owner: AgentRole::Operations,
            synthetic_description: "Create {account_type} account for the client".into(),
        }])
    }

    /// Apply every rule, splicing in synthetic tasks where required.
    pub fn apply(&self, request: &Request, mut tasks: Vec<Task>) -> Vec<Task> {
        for rule in &self.rules {
            if !rule.request_pattern.is_match(&request.request_type) {
                continue;
            }
            let satisfied = tasks
                .iter()
                .any(|t| t.owner == rule.owner && rule.description_pattern.is_match(&t.description));
            if satisfied {
                continue;
            }

            let description = rule
                .synthetic_description
                .replace("{account_type}", request.account_type());
            info!(description = %description, "Validator injecting missing critical task");
            tasks = splice_synthetic(tasks, rule.owner, description);
        }
        tasks
    }
}

/// Insert a synthetic task after the last task owned by `owner` and
/// before the first advisor notification task, then renumber ids and
/// rewire dependencies.
fn splice_synthetic(tasks: Vec<Task>, owner: AgentRole, description: String) -> Vec<Task> {
    const SYNTHETIC: &str = "__synthetic__";

    let last_owned = tasks.iter().rposition(|t| t.owner == owner);
    let first_notification = tasks.iter().position(|t| {
        t.owner == AgentRole::Advisor && t.description.to_lowercase().contains("notif")
    });
    let insert_pos = match (last_owned, first_notification) {
        (Some(last), Some(notif)) => (last + 1).min(notif),
        (Some(last), None) => last + 1,
        (None, Some(notif)) => notif,
        (None, None) => tasks.len(),
    };

    // The task the rest of the graph used to hang off; its dependents
    // move onto the synthetic task.
    let anchor = last_owned.map(|idx| tasks[idx].id.clone());

    let mut synthetic = Task::new(SYNTHETIC, description, owner).with_priority(Priority::High);
    if insert_pos > 0 {
        synthetic.dependencies = vec![tasks[insert_pos - 1].id.clone()];
    }

    let mut spliced = tasks;
    spliced.insert(insert_pos, synthetic);

    if let Some(anchor) = &anchor {
        for task in spliced.iter_mut().skip(insert_pos + 1) {
            for dep in task.dependencies.iter_mut() {
                if dep == anchor {
                    *dep = SYNTHETIC.to_string();
                }
            }
        }
    }

    renumber(spliced)
}

/// Renumber ids sequentially as `task_1..task_N`, rewriting dependencies
/// through the old-to-new map.
fn renumber(tasks: Vec<Task>) -> Vec<Task> {
    let mapping: std::collections::HashMap<String, String> = tasks
        .iter()
        .enumerate()
        .map(|(idx, task)| (task.id.clone(), format!("task_{}", idx + 1)))
        .collect();

    tasks
        .into_iter()
        .enumerate()
        .map(|(idx, mut task)| {
            task.id = format!("task_{}", idx + 1);
            for dep in task.dependencies.iter_mut() {
                if let Some(new_id) = mapping.get(dep) {
                    *dep = new_id.clone();
                }
            }
            task
        })
        .collect()
}

/// Whether the dependency graph is a DAG (Kahn's algorithm). Unknown
/// dependency ids are ignored.
pub fn is_acyclic(tasks: &[Task]) -> bool {
    use std::collections::{HashMap, HashSet};

    let ids: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    let mut indegree: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for task in tasks {
        let degree = task
            .dependencies
            .iter()
            .filter(|dep| ids.contains(dep.as_str()))
            .count();
        indegree.insert(task.id.as_str(), degree);
        for dep in &task.dependencies {
            if ids.contains(dep.as_str()) {
                dependents.entry(dep.as_str()).or_default().push(task.id.as_str());
            }
        }
    }

    let mut queue: Vec<&str> = indegree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut visited = 0;
    while let Some(id) = queue.pop() {
        visited += 1;
        for dependent in dependents.get(id).into_iter().flatten() {
            let degree = indegree.entry(dependent).or_insert(0);
            *degree -= 1;
            if *degree == 0 {
                queue.push(dependent);
            }
        }
    }
    visited == tasks.len()
}

/// Every task in the list is in a terminal status.
pub(crate) fn all_terminal(tasks: &[Task]) -> bool {
    tasks.iter().all(|t| t.status.is_terminal())
}
