//! Simulated backend systems.
//!
//! Each backend is a deterministic in-memory state machine guarded by its
//! own mutex, so concurrent workflows can share a single instance. None of
//! them performs I/O.

mod accounts;
mod crm;
mod documents;
mod notifier;

pub use accounts::{AccountRecord, AccountSystem};
pub use crm::{ClientRecord, Crm};
pub use documents::DocumentStore;
pub use notifier::{Notification, NotificationSink};

use std::sync::Arc;

/// The full set of backends a workflow engine runs against.
#[derive(Clone)]
pub struct Backends {
    pub crm: Arc<Crm>,
    pub documents: Arc<DocumentStore>,
    pub accounts: Arc<AccountSystem>,
    pub notifier: Arc<NotificationSink>,
}

impl Backends {
    /// Empty backends; seed them with the builder methods on each store.
    pub fn new() -> Self {
        Self {
            crm: Arc::new(Crm::new()),
            documents: Arc::new(DocumentStore::new()),
            accounts: Arc::new(AccountSystem::new()),
            notifier: Arc::new(NotificationSink::new()),
        }
    }

    /// Backends pre-seeded with the sample advisory-book fixtures.
    pub fn sample() -> Self {
        Self {
            crm: Arc::new(Crm::sample()),
            documents: Arc::new(DocumentStore::sample()),
            accounts: Arc::new(AccountSystem::new()),
            notifier: Arc::new(NotificationSink::new()),
        }
    }
}

impl Default for Backends {
    fn default() -> Self {
        Self::new()
    }
}
