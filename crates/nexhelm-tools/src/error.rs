//! Tool error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when invoking a tool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// Referenced entity does not exist
    #[error("{0}")]
    NotFound(String),

    /// A domain precondition was not met
    #[error("{0}")]
    PreconditionFailed(String),

    /// The operation conflicts with existing state
    #[error("{0}")]
    Conflict(String),

    /// Malformed tool parameters
    #[error("{0}")]
    InvalidArgument(String),

    /// Unexpected failure; always reported, never swallowed
    #[error("{0}")]
    Internal(String),
}

impl ToolError {
    /// The machine-readable kind of this error, as carried in event payloads.
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            Self::NotFound(_) => ToolErrorKind::NotFound,
            Self::PreconditionFailed(_) => ToolErrorKind::PreconditionFailed,
            Self::Conflict(_) => ToolErrorKind::Conflict,
            Self::InvalidArgument(_) => ToolErrorKind::InvalidArgument,
            Self::Internal(_) => ToolErrorKind::Internal,
        }
    }
}

/// Error taxonomy shared with event payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    NotFound,
    PreconditionFailed,
    Conflict,
    InvalidArgument,
    Internal,
}

impl ToolErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::PreconditionFailed => "precondition_failed",
            Self::Conflict => "conflict",
            Self::InvalidArgument => "invalid_argument",
            Self::Internal => "internal",
        }
    }
}
