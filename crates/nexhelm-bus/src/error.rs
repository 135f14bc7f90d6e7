//! Bus error types.

use thiserror::Error;

/// Errors that can occur with the event bus.
#[derive(Error, Debug)]
pub enum BusError {
    /// The workflow's channel has already been closed
    #[error("Stream closed for workflow {0}")]
    StreamClosed(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Audit sink I/O failure
    #[error("Audit sink error: {0}")]
    AuditError(String),
}
