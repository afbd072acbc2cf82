use thiserror::Error;

use crate::store::{StoreError, VersionToken};

/// Failures of a single `apply` call
#[derive(Debug, Error)]
pub enum FsmError {
    #[error("{machine} item {id} not found")]
    NotFound { machine: &'static str, id: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("conflicting update on {id}: read version {expected:?}, stored version {actual:?}")]
    Conflict {
        id: String,
        expected: Option<VersionToken>,
        actual: Option<VersionToken>,
    },

    /// Backend asked the caller to slow down; an internal failure that callers
    /// may retry after `retry_after_ms`
    #[error("store throttled the request for {id}")]
    Throttled {
        id: String,
        retry_after_ms: Option<u64>,
    },

    #[error("internal error: {reason}")]
    Internal { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("illegal action in current state: {action} is not allowed from {state} in {machine}")]
    IllegalTransition {
        machine: &'static str,
        state: String,
        action: String,
    },

    #[error("invalid payload for {action}: {reason}")]
    InvalidPayload { action: String, reason: String },
}

impl FsmError {
    /// Whether the caller may retry; conflicts only after a fresh read
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FsmError::Conflict { .. } | FsmError::Throttled { .. } | FsmError::Internal { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FsmError::NotFound { .. } => "not_found",
            FsmError::Validation(_) => "validation",
            FsmError::Conflict { .. } => "conflict",
            FsmError::Throttled { .. } => "throttled",
            FsmError::Internal { .. } => "internal",
        }
    }
}

impl From<StoreError> for FsmError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict {
                id,
                expected,
                actual,
            } => FsmError::Conflict {
                id,
                expected,
                actual,
            },
            StoreError::Throttled { id, retry_after_ms } => {
                FsmError::Throttled { id, retry_after_ms }
            }
            StoreError::InvalidId(id) => FsmError::Validation(ValidationError::InvalidPayload {
                action: "id".to_string(),
                reason: format!("invalid document id {id:?}"),
            }),
            other => FsmError::Internal {
                reason: other.to_string(),
            },
        }
    }
}
