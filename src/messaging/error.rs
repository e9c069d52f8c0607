//! Error types for messaging operations

use crate::error::AppError;

/// Result type for messaging operations
pub type MessagingResult<T> = std::result::Result<T, MessagingError>;

/// Errors that can occur during messaging operations
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Publish failed
    #[error("Publish failed: {0}")]
    PublishFailed(String),

    /// Subscribe failed
    #[error("Subscribe failed: {0}")]
    SubscribeFailed(String),

    /// Consume failed
    #[error("Consume failed: {0}")]
    ConsumeFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Backend not available
    #[error("Backend not available: {0}")]
    BackendUnavailable(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Delivered payload is not valid UTF-8 text
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),
}

impl MessagingError {
    /// Short label used for the `error` metric dimension
    pub fn kind(&self) -> &'static str {
        match self {
            MessagingError::ConnectionFailed(_) => "connection",
            MessagingError::PublishFailed(_) => "publish",
            MessagingError::SubscribeFailed(_) => "subscribe",
            MessagingError::ConsumeFailed(_) => "consume",
            MessagingError::ConfigurationError(_) => "configuration",
            MessagingError::BackendUnavailable(_) => "unavailable",
            MessagingError::Timeout(_) => "timeout",
            MessagingError::InvalidMessage(_) => "invalid_message",
        }
    }
}

impl From<std::string::FromUtf8Error> for MessagingError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        MessagingError::InvalidMessage(err.to_string())
    }
}

impl From<MessagingError> for AppError {
    fn from(err: MessagingError) -> Self {
        match err {
            MessagingError::ConfigurationError(msg) => AppError::Configuration(msg),
            MessagingError::SubscribeFailed(_)
            | MessagingError::ConsumeFailed(_)
            | MessagingError::InvalidMessage(_) => AppError::Internal(err.to_string()),
            _ => AppError::Publish(err.to_string()),
        }
    }
}
