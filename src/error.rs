//! Error taxonomy for the sync engine.
//!
//! DESIGN
//! ======
//! Each concern gets its own enum so callers can match on what actually
//! went wrong. Validation errors stop records at the boundary, repository
//! errors come back from the remote collaborator, history errors describe a
//! single command that could not be replayed. Every enum carries a grep-able
//! code through [`ErrorCode`].

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

use crate::doc::ObjectId;

/// Grep-able error code and retryable flag for surfacing errors to the host.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("non-finite {field} on object {id}")]
    NonFinite { id: ObjectId, field: &'static str },
    #[error("negative {field} on object {id}")]
    NegativeSize { id: ObjectId, field: &'static str },
    #[error("object {id} needs at least {min} points, got {got}")]
    TooFewPoints { id: ObjectId, min: usize, got: usize },
    #[error("object {0} cannot be its own parent frame")]
    SelfParent(ObjectId),
    #[error("object {id} cannot be placed in {parent}: not a frame, or the object takes no parent")]
    InvalidParent { id: ObjectId, parent: ObjectId },
    #[error("malformed object record: {0}")]
    Malformed(String),
}

impl ErrorCode for ValidationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NonFinite { .. } => "E_NON_FINITE",
            Self::NegativeSize { .. } => "E_NEGATIVE_SIZE",
            Self::TooFewPoints { .. } => "E_TOO_FEW_POINTS",
            Self::SelfParent(_) => "E_SELF_PARENT",
            Self::InvalidParent { .. } => "E_INVALID_PARENT",
            Self::Malformed(_) => "E_MALFORMED",
        }
    }
}

// =============================================================================
// REPOSITORY
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("network error: {0}")]
    Network(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("object not found: {0}")]
    NotFound(ObjectId),
    #[error("subscription closed")]
    Closed,
}

impl ErrorCode for RepositoryError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Network(_) => "E_NETWORK",
            Self::PermissionDenied(_) => "E_PERMISSION_DENIED",
            Self::NotFound(_) => "E_OBJECT_NOT_FOUND",
            Self::Closed => "E_CLOSED",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

// =============================================================================
// HISTORY
// =============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HistoryError {
    #[error("object {0} no longer exists")]
    StaleTarget(ObjectId),
    #[error("rejected by validation: {0}")]
    Invalid(#[from] ValidationError),
}

impl ErrorCode for HistoryError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::StaleTarget(_) => "E_STALE_TARGET",
            Self::Invalid(inner) => inner.error_code(),
        }
    }
}

// =============================================================================
// WRITE QUEUE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteQueueError {
    #[error("write queue worker has stopped")]
    Stopped,
    #[error("{failed} write batch(es) failed during flush")]
    DispatchFailed { failed: usize },
}

impl ErrorCode for WriteQueueError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Stopped => "E_QUEUE_STOPPED",
            Self::DispatchFailed { .. } => "E_DISPATCH_FAILED",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::DispatchFailed { .. })
    }
}
