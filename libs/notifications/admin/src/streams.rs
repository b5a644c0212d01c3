//! Stream definition for administrative notifications.

use stream_worker::StreamDef;

/// The topic admin notification events are published to.
///
/// These are the defaults; `RelayConfig` may point the relay elsewhere.
pub struct ServiceRequestsStream;

impl StreamDef for ServiceRequestsStream {
    const STREAM_NAME: &'static str = "service-requests";
    const CONSUMER_GROUP: &'static str = "notification-workers";
}
