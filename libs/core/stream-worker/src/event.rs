//! Stream event wrapper
//!
//! A delivered stream entry: the raw payload plus its stream metadata.
//! Decoding is left to the processor.

use chrono::{DateTime, Utc};

/// How an entry reached this consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverySource {
    /// First delivery via `XREADGROUP ... >`.
    New,
    /// Re-read from this consumer's own pending list after a restart.
    Pending,
    /// Claimed from another consumer that went idle.
    Claimed,
}

/// A stream event containing the raw payload and metadata
#[derive(Debug, Clone)]
pub struct StreamEvent {
    /// Redis stream entry ID (e.g., "1234567890123-0")
    pub stream_id: String,

    /// The payload bytes as written by the producer
    pub payload: Vec<u8>,

    /// When the entry was appended (parsed from stream ID)
    pub timestamp: DateTime<Utc>,

    /// How the entry was delivered
    pub source: DeliverySource,
}

impl StreamEvent {
    /// Create a new StreamEvent
    pub fn new(stream_id: impl Into<String>, payload: Vec<u8>, source: DeliverySource) -> Self {
        let stream_id = stream_id.into();
        let timestamp = Self::parse_timestamp(&stream_id);
        Self {
            stream_id,
            payload,
            timestamp,
            source,
        }
    }

    /// Parse timestamp from Redis stream ID
    ///
    /// Stream IDs are in format "timestamp_ms-sequence"
    fn parse_timestamp(stream_id: &str) -> DateTime<Utc> {
        stream_id
            .split('-')
            .next()
            .and_then(|ts| ts.parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now)
    }

    /// Check if this is a redelivery
    pub fn is_redelivery(&self) -> bool {
        self.source != DeliverySource::New
    }

    /// Get age in milliseconds
    pub fn age_ms(&self) -> i64 {
        (Utc::now() - self.timestamp).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        let now_ms = Utc::now().timestamp_millis();
        let event = StreamEvent::new(format!("{}-0", now_ms), b"{}".to_vec(), DeliverySource::New);

        assert!(event.age_ms() < 1000);
        assert!(!event.is_redelivery());
    }

    #[test]
    fn test_fixed_timestamp() {
        let event = StreamEvent::new("1700000000000-3", Vec::new(), DeliverySource::Claimed);
        assert_eq!(event.timestamp.timestamp_millis(), 1_700_000_000_000);
        assert!(event.is_redelivery());
    }

    #[test]
    fn test_malformed_id_falls_back_to_now() {
        let event = StreamEvent::new("not-an-id", Vec::new(), DeliverySource::Pending);
        assert!(event.age_ms() < 1000);
    }
}
