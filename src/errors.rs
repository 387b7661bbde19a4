use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {message} (storage: {storage_name}, status: {status})")]
    InvalidState {
        storage_name: String,
        status: String,
        message: String,
    },

    #[error("Remote store operation failed: {0}")]
    Remote(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    /// Builds the status-specific error for a storage unit that is not in a
    /// restorable status.
    pub fn not_restorable(storage_name: &str, status: &str) -> Self {
        let message = match status {
            "ENABLED" => "storage unit is already enabled",
            "RESTORING" => "storage unit is already being restored",
            _ => "storage unit is not in ARCHIVED or RESTORED status",
        };
        AppError::InvalidState {
            storage_name: storage_name.to_string(),
            status: status.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
