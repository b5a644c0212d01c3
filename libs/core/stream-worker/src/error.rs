//! Stream error types
//!
//! The worker never retries a delivered message, so errors are only
//! classified to decide how the *loop* reacts (back off, recreate the
//! consumer group, or simply continue).

use thiserror::Error;

/// Stream processing errors
#[derive(Error, Debug)]
pub enum StreamError {
    /// Redis connection or command error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The processor callback failed for a delivered message
    #[error("Processing error: {0}")]
    Processing(String),
}

impl StreamError {
    /// Create a processing error
    pub fn processing(message: impl Into<String>) -> Self {
        StreamError::Processing(message.into())
    }

    /// The consumer group (or the stream itself) does not exist.
    pub fn is_nogroup_error(&self) -> bool {
        matches!(self, StreamError::Redis(e) if e.to_string().contains("NOGROUP"))
    }

    /// Client-side response timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, StreamError::Redis(e) if e.is_timeout())
    }

    /// Lost or refused connection to Redis.
    pub fn is_connection_error(&self) -> bool {
        match self {
            StreamError::Redis(e) => {
                e.is_connection_dropped() || e.is_connection_refusal() || e.is_io_error()
            }
            StreamError::Processing(_) => false,
        }
    }
}
