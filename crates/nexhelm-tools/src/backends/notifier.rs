//! Simulated notification sink backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// One delivered notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub client_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only log of client notifications.
///
/// Stands in for the email/SMS integration of a real deployment.
pub struct NotificationSink {
    log: Mutex<Vec<Notification>>,
}

impl NotificationSink {
    pub fn new() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
        }
    }

    /// Append a notification and return the stored record.
    pub fn send(
        &self,
        client_id: &str,
        kind: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> Notification {
        let notification = Notification {
            client_id: client_id.to_string(),
            kind: kind.to_string(),
            content: content.to_string(),
            timestamp: now,
        };
        self.log.lock().unwrap().push(notification.clone());
        notification
    }

    /// All notifications sent so far, in order.
    pub fn sent(&self) -> Vec<Notification> {
        self.log.lock().unwrap().clone()
    }

    /// All notifications sent to one client, in order.
    pub fn sent_to(&self, client_id: &str) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| n.client_id == client_id)
            .collect()
    }
}

impl Default for NotificationSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_append_only_order() {
        let sink = NotificationSink::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        sink.send("c1", "form_sent", "form on its way", now);
        sink.send("c1", "account_opened", "all done", now);
        sink.send("c2", "status_update", "working on it", now);

        let all = sink.sent();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].kind, "form_sent");
        assert_eq!(sink.sent_to("c1").len(), 2);
    }
}
