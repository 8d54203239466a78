use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Store operation failed: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
