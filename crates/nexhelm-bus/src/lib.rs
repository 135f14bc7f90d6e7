//! # nexhelm-bus
//!
//! In-process event bus for the Nexhelm workflow engine.
//!
//! Components publish typed [`Event`] envelopes; observers subscribe per
//! workflow and receive them in publication order over bounded channels.
//! A slow subscriber either back-pressures the publisher or sheds
//! non-critical events, depending on [`OverflowPolicy`]; critical events
//! are never dropped.

mod audit;
mod envelope;
mod error;
mod memory;

pub use audit::AuditSink;
pub use envelope::{Event, EventType};
pub use error::BusError;
pub use memory::{BusConfig, EventBus, EventSubscription, OverflowPolicy};
