use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Remote store error: {0}")]
    StoreError(String),

    #[error("Duplicate row: {0}")]
    Duplicate(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Remote store not configured (offline mode)")]
    Offline,

    #[error("Local storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl TrackerError {
    /// Errors worth another attempt after a short pause.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NetworkError(_))
    }
}

impl From<reqwest::Error> for TrackerError {
    fn from(e: reqwest::Error) -> Self {
        Self::NetworkError(e.to_string())
    }
}

impl From<sled::Error> for TrackerError {
    fn from(e: sled::Error) -> Self {
        Self::StorageError(e.to_string())
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(e: serde_json::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

pub type TrackerResult<T> = Result<T, TrackerError>;
