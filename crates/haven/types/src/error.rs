use crate::case::CaseStatus;
use crate::event::ActionKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why the authorization guard denied an action.
///
/// These are stable machine-readable reasons; callers branch on them, so
/// variants are never renamed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenyReason {
    NotAuthorized,
    WrongRole,
    NotOwner,
    InvalidState,
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::NotAuthorized => "NOT_AUTHORIZED",
            DenyReason::WrongRole => "WRONG_ROLE",
            DenyReason::NotOwner => "NOT_OWNER",
            DenyReason::InvalidState => "INVALID_STATE",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// The error taxonomy surfaced at the action boundary.
///
/// Guard and lifecycle failures are terminal for the call; only
/// `CommitFailed` is eligible for automatic retry, and only inside the
/// submitter.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HavenError {
    #[error("not authorized ({0})")]
    NotAuthorized(DenyReason),

    #[error("action '{action}' is not legal from status {from}")]
    InvalidState { from: CaseStatus, action: ActionKind },

    #[error("volunteer already accepted this case")]
    AlreadyAccepted,

    #[error("volunteer must accept the case before submitting a report")]
    MustAcceptFirst,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("ledger did not durably commit: {0}")]
    CommitFailed(String),

    #[error("sequence conflict: expected {expected}, got {got}")]
    SequenceConflict { expected: u64, got: u64 },
}

impl HavenError {
    /// Stable error code for the wire; never a stack trace.
    pub fn code(&self) -> &'static str {
        match self {
            HavenError::NotAuthorized(reason) => reason.code(),
            HavenError::InvalidState { .. } => "INVALID_STATE",
            HavenError::AlreadyAccepted => "ALREADY_ACCEPTED",
            HavenError::MustAcceptFirst => "MUST_ACCEPT_FIRST",
            HavenError::NotFound(_) => "NOT_FOUND",
            HavenError::Validation(_) => "VALIDATION_ERROR",
            HavenError::CommitFailed(_) => "COMMIT_FAILED",
            HavenError::SequenceConflict { .. } => "SEQUENCE_CONFLICT",
        }
    }

    /// Whether a caller may safely retry the same call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HavenError::CommitFailed(_))
    }
}

pub type HavenResult<T> = Result<T, HavenError>;
