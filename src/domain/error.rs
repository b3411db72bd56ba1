use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl DomainError {
    /// Infrastructure failures that a caller may retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::Connection(_) | DomainError::Timeout(_))
    }
}

impl From<&str> for DomainError {
    fn from(s: &str) -> Self {
        DomainError::Validation(s.to_string())
    }
}

impl From<rusqlite::Error> for DomainError {
    fn from(e: rusqlite::Error) -> Self {
        DomainError::Database(e.to_string())
    }
}

impl From<redis::RedisError> for DomainError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
            DomainError::Connection(e.to_string())
        } else {
            DomainError::Database(e.to_string())
        }
    }
}

impl From<crate::config::ConfigError> for DomainError {
    fn from(e: crate::config::ConfigError) -> Self {
        DomainError::Config(e.to_string())
    }
}
