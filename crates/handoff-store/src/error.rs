use handoff_core::AppError;
use thiserror::Error;
use uuid::Uuid;

/// Store operation errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session not found: {0}")]
    NotFound(Uuid),

    #[error("session expired: {0}")]
    Expired(Uuid),

    #[error("session already exists: {0}")]
    AlreadyExists(Uuid),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => AppError::NotFound("session not found".to_string()),
            StoreError::Expired(_) => AppError::Expired("session expired".to_string()),
            StoreError::AlreadyExists(id) => {
                AppError::Internal(format!("duplicate session id {}", id))
            }
        }
    }
}
