//! Error types for the admin notification relay.

use thiserror::Error;

/// Result type for relay operations.
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Errors surfaced by the codec, publisher and dispatcher.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The event could not be serialized.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The payload is not a valid envelope.
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// The event cannot be dispatched as-is (e.g. no recipients).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The broker refused or failed the append.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Recipients could not be resolved from the admin directory.
    #[error("Directory error: {0}")]
    Directory(String),

    /// Missing or invalid relay configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl NotificationError {
    pub fn no_recipients() -> Self {
        Self::Validation("no recipients".to_string())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<stream_worker::StreamError> for NotificationError {
    fn from(err: stream_worker::StreamError) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<core_config::ConfigError> for NotificationError {
    fn from(err: core_config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// A single send through the mail transport failed.
///
/// Always scoped to one recipient; the dispatcher records it and moves on.
#[derive(Debug, Error)]
pub enum MailError {
    /// The transport could not parse an address or build the message.
    #[error("Failed to build message: {0}")]
    Build(String),

    /// The mail server rejected the message or could not be reached.
    #[error("Failed to send message: {0}")]
    Send(String),
}
