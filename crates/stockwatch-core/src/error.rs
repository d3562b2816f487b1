use thiserror::Error;

/// Application-wide error types for stockwatch.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (non-2xx status or malformed exchange).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Every fetch attempt for a URL failed.
    #[error("Fetching {url} failed after {attempts} attempts: {last_error}")]
    FetchExhausted {
        url: String,
        attempts: u32,
        last_error: Box<AppError>,
    },

    /// The notification channel rejected or could not receive a message.
    #[error("Notification error: {0}")]
    NotifyError(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A connectivity probe failed before the run touched any state.
    #[error("Setup failed: {0}")]
    Setup(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::HttpError(_)
        )
    }
}
