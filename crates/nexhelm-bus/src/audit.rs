//! CSV audit sink for successful account creations.
//!
//! An optional bus subscriber: it watches a workflow's stream for the
//! terminal event and, when the outcome carries an account number,
//! appends one CSV row per creation:
//!
//! `timestamp,client_id,account_type,account_number,workflow_id`

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::envelope::EventType;
use crate::error::BusError;
use crate::memory::EventSubscription;

/// Appends account-creation rows to a CSV file.
pub struct AuditSink {
    path: PathBuf,
}

impl AuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Consume a subscription until end-of-stream, recording any account
    /// creation found in the terminal event's outcome.
    pub fn attach(&self, mut subscription: EventSubscription) -> JoinHandle<()> {
        let path = self.path.clone();
        tokio::spawn(async move {
            while let Some(event) = subscription.next_event().await {
                if event.event_type != EventType::WorkflowComplete {
                    continue;
                }
                let outcome = &event.payload["outcome"];
                let Some(account_number) = outcome["account_number"].as_str() else {
                    continue;
                };
                let row = AuditRow {
                    timestamp_ms: event.timestamp_ms,
                    client_id: outcome["client_id"].as_str().unwrap_or("").to_string(),
                    account_type: outcome["account_type"].as_str().unwrap_or("").to_string(),
                    account_number: account_number.to_string(),
                    workflow_id: event.workflow_id.clone(),
                };
                if let Err(err) = append_row(&path, &row) {
                    warn!(error = %err, "Failed to append audit row");
                } else {
                    info!(account_number = %row.account_number, "Account creation audited");
                }
            }
        })
    }
}

struct AuditRow {
    timestamp_ms: i64,
    client_id: String,
    account_type: String,
    account_number: String,
    workflow_id: String,
}

fn append_row(path: &Path, row: &AuditRow) -> Result<(), BusError> {
    let new_file = !path.exists();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| BusError::AuditError(e.to_string()))?;

    if new_file {
        writeln!(file, "timestamp,client_id,account_type,account_number,workflow_id")
            .map_err(|e| BusError::AuditError(e.to_string()))?;
    }
    let timestamp = Utc
        .timestamp_millis_opt(row.timestamp_ms)
        .earliest()
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();
    writeln!(
        file,
        "{},{},{},{},{}",
        timestamp, row.client_id, row.account_type, row.account_number, row.workflow_id
    )
    .map_err(|e| BusError::AuditError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Event;
    use crate::memory::EventBus;
    use serde_json::json;

    #[tokio::test]
    async fn test_audit_rows_written_on_completion() {
        let dir = std::env::temp_dir().join("nexhelm-audit-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("audit-{}.csv", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let bus = EventBus::default();
        let sink = AuditSink::new(&path);
        let handle = sink.attach(bus.subscribe("wf-1").await);

        bus.publish(Event::new(
            EventType::WorkflowComplete,
            "wf-1",
            json!({
                "status": "completed",
                "outcome": {
                    "account_number": "ROTH_IRA-1000",
                    "account_type": "roth_ira",
                    "client_id": "john_smith_123",
                },
            }),
            1_705_314_600_000,
        ))
        .await;
        handle.await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("timestamp,"));
        assert!(lines[1].contains("ROTH_IRA-1000"));
        assert!(lines[1].ends_with("wf-1"));

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_no_row_without_outcome() {
        let dir = std::env::temp_dir().join("nexhelm-audit-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("audit-empty-{}.csv", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let bus = EventBus::default();
        let sink = AuditSink::new(&path);
        let handle = sink.attach(bus.subscribe("wf-2").await);

        bus.publish(Event::new(
            EventType::WorkflowComplete,
            "wf-2",
            json!({"status": "blocked", "outcome": {}}),
            0,
        ))
        .await;
        handle.await.unwrap();

        assert!(!path.exists());
        let _ = std::fs::remove_file(&path);
    }
}
