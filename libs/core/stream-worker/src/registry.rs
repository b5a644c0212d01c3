//! Stream definitions and the processor callback contract.

use crate::error::StreamError;
use crate::event::StreamEvent;
use async_trait::async_trait;

/// Field name under which the encoded payload is stored in each stream entry.
pub const PAYLOAD_FIELD: &str = "payload";

/// Stream definition trait.
///
/// Each domain implements this trait to name its stream and consumer group.
///
/// # Example
///
/// ```rust,ignore
/// use stream_worker::StreamDef;
///
/// pub struct ServiceRequests;
///
/// impl StreamDef for ServiceRequests {
///     const STREAM_NAME: &'static str = "service-requests";
///     const CONSUMER_GROUP: &'static str = "notification-workers";
/// }
/// ```
pub trait StreamDef: Send + Sync {
    /// The Redis stream name.
    const STREAM_NAME: &'static str;

    /// The consumer group name for this stream.
    const CONSUMER_GROUP: &'static str;

    /// Maximum stream length before auto-trim (MAXLEN ~).
    const MAX_LENGTH: i64 = 100_000;
}

/// Callback invoked once per delivered stream entry.
///
/// The worker acknowledges the entry after `process` returns, whether it
/// returned `Ok` or `Err`. An `Err` is logged and counted, nothing more:
/// there is no retry and no dead letter stream.
#[async_trait]
pub trait StreamProcessor: Send + Sync {
    /// Handle a single delivery.
    async fn process(&self, event: &StreamEvent) -> Result<(), StreamError>;

    /// Processor name for logs and metric labels.
    fn name(&self) -> &'static str;

    /// Health check for downstream dependencies. Default: always healthy.
    async fn health_check(&self) -> Result<bool, StreamError> {
        Ok(true)
    }
}
