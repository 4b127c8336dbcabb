use ordinal_api::{ErrorKind, ErrorPayload};
use ordinal_core::KeyError;
use thiserror::Error;

use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum ReorderError {
    #[error(transparent)]
    Key(#[from] KeyError),

    /// The read+write unit could not complete, e.g. the moving record was deleted
    #[error("Write conflict on record {id}: {reason}")]
    WriteConflict { id: String, reason: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReorderError {
    pub fn write_conflict(id: impl Into<String>, reason: impl Into<String>) -> Self {
        ReorderError::WriteConflict {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ReorderError::Key(KeyError::InvariantViolation { .. }) => ErrorKind::InvariantViolation,
            ReorderError::Key(KeyError::InvalidKey { .. }) => ErrorKind::InvalidKey,
            ReorderError::Key(KeyError::InvalidAlphabet(_)) => ErrorKind::Internal,
            ReorderError::WriteConflict { .. } => ErrorKind::WriteConflict,
            ReorderError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ReorderError::Store(StoreError::Busy(_)) => ErrorKind::WriteConflict,
            ReorderError::Store(StoreError::DuplicateId { .. }) => ErrorKind::InvalidRequest,
            ReorderError::Store(_) => ErrorKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload::new(self.kind(), self.to_string())
    }
}
