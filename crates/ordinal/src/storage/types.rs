use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Another writer holds the database; the whole unit may be retried
    #[error("Storage busy: {0}")]
    Busy(String),

    #[error("Record {id} already exists in scope {scope}")]
    DuplicateId { scope: String, id: String },

    #[error("Invalid table layout: {0}")]
    InvalidLayout(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage task failed: {0}")]
    TaskFailed(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Busy(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked) => {
                StoreError::Busy(err.to_string())
            }
            _ => StoreError::Database(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::TaskFailed(err.to_string())
    }
}
