//! Stream producer
//!
//! Appends encoded payloads to a Redis stream. Used by any service that
//! needs to hand work to a consumer group.
//!
//! # Example
//!
//! ```rust,ignore
//! use stream_worker::StreamProducer;
//!
//! let producer = StreamProducer::from_stream_def::<ServiceRequests>(redis);
//! let entry_id = producer.append(br#"{"adminEmails":[]}"#).await?;
//! ```

use crate::error::StreamError;
use crate::registry::{StreamDef, PAYLOAD_FIELD};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;
use tracing::debug;

/// Stream producer for appending payloads.
#[derive(Clone)]
pub struct StreamProducer {
    redis: Arc<ConnectionManager>,
    stream_name: String,
    max_length: i64,
}

impl StreamProducer {
    /// Create a new StreamProducer for a specific stream.
    pub fn new(redis: ConnectionManager, stream_name: impl Into<String>) -> Self {
        Self::from_arc(Arc::new(redis), stream_name)
    }

    /// Create a producer from a `StreamDef` implementation.
    pub fn from_stream_def<S: StreamDef>(redis: ConnectionManager) -> Self {
        Self::from_arc(Arc::new(redis), S::STREAM_NAME).with_max_length(S::MAX_LENGTH)
    }

    /// Create from an Arc<ConnectionManager> (for sharing connections).
    pub fn from_arc(redis: Arc<ConnectionManager>, stream_name: impl Into<String>) -> Self {
        Self {
            redis,
            stream_name: stream_name.into(),
            max_length: 100_000,
        }
    }

    /// Set the maximum stream length (MAXLEN ~).
    pub fn with_max_length(mut self, max_length: i64) -> Self {
        self.max_length = max_length;
        self
    }

    /// Get the stream name.
    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// Append one payload to the stream.
    ///
    /// Returns the stream entry ID once Redis has accepted the write.
    pub async fn append(&self, payload: &[u8]) -> Result<String, StreamError> {
        let mut conn = (*self.redis).clone();

        // MAXLEN ~ trims approximately, which is much cheaper than an exact trim
        let stream_id: String = redis::cmd("XADD")
            .arg(&self.stream_name)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.max_length)
            .arg("*")
            .arg(PAYLOAD_FIELD)
            .arg(payload)
            .query_async(&mut conn)
            .await?;

        debug!(
            stream = %self.stream_name,
            stream_id = %stream_id,
            bytes = payload.len(),
            "Appended payload"
        );

        Ok(stream_id)
    }

    /// Get the current stream length.
    pub async fn stream_length(&self) -> Result<i64, StreamError> {
        let mut conn = (*self.redis).clone();
        let len: i64 = conn.xlen(&self.stream_name).await?;
        Ok(len)
    }
}
