//! Request/response shapes of the reorder endpoint

use serde::{Deserialize, Serialize};

/// "Put `moved_item_id` directly after `after_item_id`".
///
/// `after_item_id = None` moves the item to the front. Positional indices are
/// deliberately absent: with other writers around, only adjacency means
/// anything to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    pub moved_item_id: String,
    pub after_item_id: Option<String>,
}

impl ReorderRequest {
    pub fn new(moved_item_id: impl Into<String>, after_item_id: Option<String>) -> Self {
        Self {
            moved_item_id: moved_item_id.into(),
            after_item_id,
        }
    }

    pub fn to_front(moved_item_id: impl Into<String>) -> Self {
        Self::new(moved_item_id, None)
    }

    pub fn after(moved_item_id: impl Into<String>, after_item_id: impl Into<String>) -> Self {
        Self::new(moved_item_id, Some(after_item_id.into()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderResponse {
    pub sort_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// The key algebra was called with `lower >= upper`; a server bug
    InvariantViolation,
    /// A stored key is not valid in the configured alphabet
    InvalidKey,
    /// The atomic read+write did not complete; the move may be retried
    WriteConflict,
    InvalidRequest,
    Internal,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::WriteConflict)
    }
}

/// Error body returned instead of a `ReorderResponse`. No row was changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{kind:?}: {message}")]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl ErrorPayload {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: kind.is_retryable(),
        }
    }
}
