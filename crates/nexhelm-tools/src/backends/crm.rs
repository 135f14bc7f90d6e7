//! Simulated CRM backend.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// A client record as the CRM stores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRecord {
    pub name: String,
    pub age: u32,
    pub email: String,
    pub income: u64,
    #[serde(default)]
    pub existing_accounts: Vec<String>,
}

/// Simulated customer relationship management system.
///
/// Read-only from the engine's perspective: the workflow never mutates
/// client records, it only enriches its own context from them.
pub struct Crm {
    clients: Mutex<HashMap<String, ClientRecord>>,
}

impl Crm {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// CRM seeded with the sample advisory book.
    pub fn sample() -> Self {
        let crm = Self::new();
        crm.seed_client(
            "john_smith_123",
            ClientRecord {
                name: "John Smith".into(),
                age: 45,
                email: "john@example.com".into(),
                income: 145_000,
                existing_accounts: vec!["checking".into(), "brokerage".into()],
            },
        );
        crm.seed_client(
            "test_client_complete",
            ClientRecord {
                name: "Test Client Complete".into(),
                age: 35,
                email: "test@example.com".into(),
                income: 120_000,
                existing_accounts: vec![],
            },
        );
        crm
    }

    /// Insert or replace a client record.
    pub fn seed_client(&self, client_id: impl Into<String>, record: ClientRecord) {
        self.clients.lock().unwrap().insert(client_id.into(), record);
    }

    /// Look up a client by id.
    pub fn client(&self, client_id: &str) -> Option<ClientRecord> {
        self.clients.lock().unwrap().get(client_id).cloned()
    }

    /// Whether a client exists.
    pub fn contains(&self, client_id: &str) -> bool {
        self.clients.lock().unwrap().contains_key(client_id)
    }
}

impl Default for Crm {
    fn default() -> Self {
        Self::new()
    }
}
