// In crates/database/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to connect to the database")]
    ConnectionError(#[from] sqlx::Error),
    #[error("Database migration failed: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),
    #[error("Database operation failed")]
    OperationFailed(sqlx::Error),
    #[error("No row found for {0}")]
    NotFound(String),
    #[error("Stored row is malformed: {0}")]
    Corrupt(String),
    /// A conditional write found the row changed since the caller read it.
    #[error("Concurrent update of {0}")]
    Conflict(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Any persistence failure reaches the domain as `StorageUnavailable`;
/// callers must not assume the operation applied.
impl From<Error> for core_types::Error {
    fn from(err: Error) -> Self {
        let detail = match &err {
            Error::ConnectionError(source) | Error::OperationFailed(source) => {
                format!("{err}: {source}")
            }
            _ => err.to_string(),
        };
        core_types::Error::StorageUnavailable(detail)
    }
}
