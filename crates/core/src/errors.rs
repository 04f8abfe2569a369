use thiserror::Error;

use crate::domain::booking::AttemptState;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid booking attempt transition from {from:?} to {to:?}")]
    InvalidAttemptTransition { from: AttemptState, to: AttemptState },
}

/// Failure classes an action handler can report back to the agent platform.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("missing required fields: {}", missing_fields.join(", "))]
    Validation { missing_fields: Vec<String> },
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    SlotUnavailable(String),
    #[error("unsupported action: {0}")]
    UnsupportedAction(String),
    #[error("storage temporarily unavailable: {0}")]
    TransientStorage(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ActionError {
    pub fn missing(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Validation { missing_fields: fields.into_iter().map(Into::into).collect() }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. }
            | Self::NotFound(_)
            | Self::SlotUnavailable(_)
            | Self::UnsupportedAction(_) => 400,
            Self::TransientStorage(_) | Self::Internal(_) => 500,
        }
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::SlotUnavailable(_) => "slot_unavailable",
            Self::UnsupportedAction(_) => "unsupported_action",
            Self::TransientStorage(_) => "transient_storage_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Only storage failures leave the system in a state where replaying the
    /// identical request is safe.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStorage(_))
    }
}
