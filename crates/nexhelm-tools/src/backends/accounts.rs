//! Simulated account system backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::ToolError;

/// An account held in the simulated book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub account_number: String,
    pub client_id: String,
    pub account_type: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

struct Book {
    accounts: HashMap<String, AccountRecord>,
    counter: u64,
}

/// Simulated account management system.
///
/// Account numbers are `<ACCOUNT_TYPE>-<N>` with `N` monotonically
/// increasing from 1000. A client may hold at most one account of a given
/// type; the duplicate check and the insert happen under one lock, so the
/// rule holds across concurrent workflows.
pub struct AccountSystem {
    book: Mutex<Book>,
}

impl AccountSystem {
    pub fn new() -> Self {
        Self {
            book: Mutex::new(Book {
                accounts: HashMap::new(),
                counter: 1000,
            }),
        }
    }

    /// Open an account, enforcing at most one of each type per client.
    pub fn open_account(
        &self,
        client_id: &str,
        account_type: &str,
        now: DateTime<Utc>,
    ) -> Result<AccountRecord, ToolError> {
        let mut book = self.book.lock().unwrap();

        if let Some(existing) = book
            .accounts
            .values()
            .find(|a| a.client_id == client_id && a.account_type == account_type)
        {
            return Err(ToolError::Conflict(format!(
                "Client {client_id} already has a {account_type} account: {}",
                existing.account_number
            )));
        }

        let account_number = format!("{}-{}", account_type.to_uppercase(), book.counter);
        book.counter += 1;

        let record = AccountRecord {
            account_number: account_number.clone(),
            client_id: client_id.to_string(),
            account_type: account_type.to_string(),
            status: "active".into(),
            created_at: now,
        };
        book.accounts.insert(account_number, record.clone());
        Ok(record)
    }

    /// Look up an account by number.
    pub fn account(&self, account_number: &str) -> Option<AccountRecord> {
        self.book.lock().unwrap().accounts.get(account_number).cloned()
    }

    /// All accounts, ordered by account number.
    pub fn all_accounts(&self) -> Vec<AccountRecord> {
        let book = self.book.lock().unwrap();
        let mut accounts: Vec<AccountRecord> = book.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.account_number.cmp(&b.account_number));
        accounts
    }

    /// All accounts held by one client.
    pub fn accounts_for(&self, client_id: &str) -> Vec<AccountRecord> {
        self.all_accounts()
            .into_iter()
            .filter(|a| a.client_id == client_id)
            .collect()
    }
}

impl Default for AccountSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
    }

    #[test]
    fn test_account_numbers_increase_from_1000() {
        let sys = AccountSystem::new();
        let a = sys.open_account("c1", "roth_ira", now()).unwrap();
        let b = sys.open_account("c2", "roth_ira", now()).unwrap();
        assert_eq!(a.account_number, "ROTH_IRA-1000");
        assert_eq!(b.account_number, "ROTH_IRA-1001");
    }

    #[test]
    fn test_duplicate_type_is_conflict() {
        let sys = AccountSystem::new();
        sys.open_account("c1", "roth_ira", now()).unwrap();
        let err = sys.open_account("c1", "roth_ira", now()).unwrap_err();
        match err {
            ToolError::Conflict(msg) => {
                assert!(msg.contains("already has a roth_ira account: ROTH_IRA-1000"));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        // A different type is still allowed.
        sys.open_account("c1", "traditional_ira", now()).unwrap();
    }

    #[test]
    fn test_lookup_and_listing() {
        let sys = AccountSystem::new();
        let rec = sys.open_account("c1", "roth_ira", now()).unwrap();
        assert!(sys.account(&rec.account_number).is_some());
        assert_eq!(sys.accounts_for("c1").len(), 1);
        assert!(sys.accounts_for("c2").is_empty());
    }
}
