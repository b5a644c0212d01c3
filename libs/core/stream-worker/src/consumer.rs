//! Stream consumer for Redis operations
//!
//! Reads entries from a Redis stream through a consumer group and
//! acknowledges them.

use crate::config::WorkerConfig;
use crate::error::StreamError;
use crate::event::{DeliverySource, StreamEvent};
use crate::registry::PAYLOAD_FIELD;
use redis::aio::ConnectionManager;
use redis::streams::{
    StreamAutoClaimOptions, StreamAutoClaimReply, StreamId, StreamReadOptions, StreamReadReply,
};
use redis::{AsyncCommands, RedisResult, Value};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Stream consumer for Redis operations
pub struct StreamConsumer {
    redis: Arc<ConnectionManager>,
    config: WorkerConfig,
}

impl StreamConsumer {
    /// Create a new StreamConsumer
    pub fn new(redis: Arc<ConnectionManager>, config: WorkerConfig) -> Self {
        Self { redis, config }
    }

    /// Get the stream name
    pub fn stream_name(&self) -> &str {
        &self.config.stream_name
    }

    /// Get the consumer group
    pub fn consumer_group(&self) -> &str {
        &self.config.consumer_group
    }

    /// Get the consumer ID
    pub fn consumer_id(&self) -> &str {
        &self.config.consumer_id
    }

    /// Create the consumer group (and the stream) if it doesn't exist
    pub async fn ensure_consumer_group(&self) -> Result<(), StreamError> {
        let mut conn = (*self.redis).clone();

        let result: RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("0") // Start from beginning
            .arg("MKSTREAM") // Create stream if it doesn't exist
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => {
                info!(
                    stream = %self.config.stream_name,
                    group = %self.config.consumer_group,
                    "Created consumer group"
                );
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(
                    stream = %self.config.stream_name,
                    group = %self.config.consumer_group,
                    "Consumer group already exists"
                );
            }
            Err(e) => return Err(StreamError::Redis(e)),
        }

        Ok(())
    }

    /// Read this consumer's pending entries (delivered earlier, never acknowledged)
    pub async fn read_pending(&self) -> Result<Vec<StreamEvent>, StreamError> {
        let mut conn = (*self.redis).clone();

        let opts = StreamReadOptions::default()
            .group(&self.config.consumer_group, &self.config.consumer_id)
            .count(self.config.batch_size);

        let reply: StreamReadReply = conn
            .xread_options(&[&self.config.stream_name], &["0"], &opts)
            .await?;

        Ok(Self::collect(reply, DeliverySource::Pending))
    }

    /// Read new entries, blocking on the server when configured
    pub async fn read_new(&self) -> Result<Vec<StreamEvent>, StreamError> {
        let mut conn = (*self.redis).clone();

        let mut opts = StreamReadOptions::default()
            .group(&self.config.consumer_group, &self.config.consumer_id)
            .count(self.config.batch_size);

        if let Some(timeout) = self.config.block_timeout_ms {
            opts = opts.block(timeout as usize);
        }

        // A BLOCK timeout comes back as nil
        let reply: Option<StreamReadReply> = conn
            .xread_options(&[&self.config.stream_name], &[">"], &opts)
            .await?;

        Ok(reply
            .map(|r| Self::collect(r, DeliverySource::New))
            .unwrap_or_default())
    }

    /// Acknowledge an entry
    pub async fn ack(&self, stream_id: &str) -> Result<(), StreamError> {
        let mut conn = (*self.redis).clone();

        let _: i64 = conn
            .xack(
                &self.config.stream_name,
                &self.config.consumer_group,
                &[stream_id],
            )
            .await?;

        debug!(stream_id = %stream_id, "Acknowledged message");
        Ok(())
    }

    /// Claim entries that another consumer left pending for longer than `claim_idle_ms`
    pub async fn claim_abandoned(&self) -> Result<Vec<StreamEvent>, StreamError> {
        let mut conn = (*self.redis).clone();

        let opts = StreamAutoClaimOptions::default().count(self.config.batch_size);

        let reply: StreamAutoClaimReply = conn
            .xautoclaim_options(
                &self.config.stream_name,
                &self.config.consumer_group,
                &self.config.consumer_id,
                self.config.claim_idle_ms,
                "0-0",
                opts,
            )
            .await?;

        let events: Vec<StreamEvent> = reply
            .claimed
            .into_iter()
            .map(|entry| Self::to_event(entry, DeliverySource::Claimed))
            .collect();

        if !events.is_empty() {
            warn!(
                count = events.len(),
                consumer = %self.config.consumer_id,
                "Claimed abandoned messages"
            );
        }

        Ok(events)
    }

    /// Get stream length and the group's pending count
    pub async fn stream_info(&self) -> Result<StreamInfo, StreamError> {
        let mut conn = (*self.redis).clone();

        let length: i64 = conn.xlen(&self.config.stream_name).await?;

        // Summary form: [count, smallest-id, greatest-id, [[consumer, count], ...]]
        let pending: RedisResult<(i64, Option<String>, Option<String>, Option<Vec<(String, i64)>>)> =
            redis::cmd("XPENDING")
                .arg(&self.config.stream_name)
                .arg(&self.config.consumer_group)
                .query_async(&mut conn)
                .await;

        let pending_count = pending.map(|(count, _, _, _)| count).unwrap_or(0);

        Ok(StreamInfo {
            stream_name: self.config.stream_name.clone(),
            consumer_group: self.config.consumer_group.clone(),
            length,
            pending_count,
        })
    }

    fn collect(reply: StreamReadReply, source: DeliverySource) -> Vec<StreamEvent> {
        reply
            .keys
            .into_iter()
            .flat_map(|key| key.ids)
            .map(|entry| Self::to_event(entry, source))
            .collect()
    }

    /// Extract the payload field. A missing or non-string field becomes an
    /// empty payload so the processor still sees (and rejects) the entry.
    fn to_event(entry: StreamId, source: DeliverySource) -> StreamEvent {
        let payload = match entry.map.get(PAYLOAD_FIELD) {
            Some(Value::BulkString(bytes)) => bytes.clone(),
            Some(Value::SimpleString(s)) => s.clone().into_bytes(),
            Some(other) => {
                warn!(stream_id = %entry.id, value = ?other, "Unexpected payload type");
                Vec::new()
            }
            None => {
                warn!(
                    stream_id = %entry.id,
                    fields = ?entry.map.keys().collect::<Vec<_>>(),
                    "Missing payload field in message"
                );
                Vec::new()
            }
        };

        StreamEvent::new(entry.id, payload, source)
    }
}

/// Stream information
#[derive(Debug, Clone, Serialize)]
pub struct StreamInfo {
    pub stream_name: String,
    pub consumer_group: String,
    pub length: i64,
    pub pending_count: i64,
}
