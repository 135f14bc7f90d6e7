//! # nexhelm-tools
//!
//! Simulated backend systems and the tool registry for the Nexhelm
//! workflow engine.
//!
//! The backends (CRM, document store, account system, notification sink)
//! are deterministic in-memory state machines: no network, no disk. They
//! are injected into the engine rather than discovered, so tests can
//! substitute their own fixtures.
//!
//! The [`ToolRegistry`] resolves a tool name and JSON parameters into a
//! typed result. Backend failures are surfaced as [`ToolError`] values,
//! never smuggled inside a success payload: the registry re-tags any
//! payload that still carries an `error` field.

mod backends;
mod clock;
mod error;
mod registry;
mod tools;

pub use backends::{
    AccountRecord, AccountSystem, Backends, ClientRecord, Crm, DocumentStore, Notification,
    NotificationSink,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ToolError, ToolErrorKind};
pub use registry::{Tool, ToolOutput, ToolRegistry};
pub use tools::standard_registry;
