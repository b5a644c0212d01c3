//! Subscriber side of the relay.
//!
//! Every delivered payload is decoded and fanned out once. The stream
//! worker acknowledges the entry after `process` returns, so nothing here
//! asks for redelivery: a payload that cannot be decoded never will be, and
//! recipient problems are already accounted for in the outcome.
//!
//! Delivery is at-least-once and there is no deduplication: a redelivered
//! entry runs the full fan-out again.

use crate::codec;
use crate::dispatcher::Dispatcher;
use crate::error::{NotificationError, NotificationResult};
use crate::models::DispatchOutcome;
use crate::transport::MailTransport;
use async_trait::async_trait;
use stream_worker::{StreamError, StreamEvent, StreamProcessor};
use tracing::{error, info, warn};

/// How a single delivery ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Decoded and fanned out.
    Completed(DispatchOutcome),
    /// The payload could not be decoded.
    Rejected(String),
    /// Decoded, but the event cannot be dispatched (no recipients).
    Invalid(String),
}

/// Stream processor that relays notification events to their recipients.
pub struct NotificationSubscriber<T: MailTransport> {
    dispatcher: Dispatcher<T>,
}

impl<T: MailTransport> NotificationSubscriber<T> {
    pub fn new(dispatcher: Dispatcher<T>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher<T> {
        &self.dispatcher
    }

    /// Decode and dispatch one payload.
    ///
    /// Expected failures come back as `Ok` with a terminal outcome; only
    /// unclassified errors are returned as `Err`.
    pub async fn handle(&self, payload: &[u8]) -> NotificationResult<DeliveryOutcome> {
        let event = match codec::decode(payload) {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, payload_len = payload.len(), "Rejecting undecodable notification");
                return Ok(DeliveryOutcome::Rejected(e.to_string()));
            }
        };

        match self.dispatcher.dispatch(&event).await {
            Ok(outcome) => Ok(DeliveryOutcome::Completed(outcome)),
            Err(NotificationError::Validation(reason)) => {
                warn!(reason = %reason, subject = %event.subject(), "Notification not dispatched");
                Ok(DeliveryOutcome::Invalid(reason))
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl<T: MailTransport + 'static> StreamProcessor for NotificationSubscriber<T> {
    async fn process(&self, event: &StreamEvent) -> Result<(), StreamError> {
        if event.is_redelivery() {
            info!(
                stream_id = %event.stream_id,
                source = ?event.source,
                "Notification delivered again, dispatching in full"
            );
        }

        match self.handle(&event.payload).await {
            Ok(DeliveryOutcome::Completed(outcome)) => {
                info!(
                    stream_id = %event.stream_id,
                    attempted = outcome.attempted,
                    succeeded = outcome.succeeded,
                    skipped_invalid = outcome.skipped_invalid,
                    failed_transport = outcome.failed_transport,
                    "Notification processed"
                );
                Ok(())
            }
            Ok(DeliveryOutcome::Rejected(_)) | Ok(DeliveryOutcome::Invalid(_)) => Ok(()),
            Err(e) => Err(StreamError::processing(e.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "admin_notifications"
    }

    async fn health_check(&self) -> Result<bool, StreamError> {
        match self.dispatcher.transport().health_check().await {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(error = %e, transport = self.dispatcher.transport().name(), "Mail transport unhealthy");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationEvent;
    use crate::transport::MockMailTransport;
    use stream_worker::DeliverySource;

    fn subscriber(transport: MockMailTransport) -> NotificationSubscriber<MockMailTransport> {
        NotificationSubscriber::new(Dispatcher::new(transport, "noreply@example.com"))
    }

    fn delivery(payload: &[u8], source: DeliverySource) -> StreamEvent {
        StreamEvent::new("1700000000000-0".to_string(), payload.to_vec(), source)
    }

    fn encoded(recipients: &[&str]) -> Vec<u8> {
        codec::encode(&NotificationEvent::new(recipients.iter().copied(), "S", "M")).unwrap()
    }

    #[tokio::test]
    async fn test_handle_completes_dispatch() {
        let transport = MockMailTransport::new();
        let subscriber = subscriber(transport.clone());

        let outcome = subscriber
            .handle(&encoded(&["valid@example.com", "invalid-email"]))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DeliveryOutcome::Completed(DispatchOutcome {
                attempted: 2,
                succeeded: 1,
                skipped_invalid: 1,
                failed_transport: 0,
            })
        );
        assert_eq!(transport.sent_count().await, 1);
    }

    #[tokio::test]
    async fn test_handle_rejects_malformed_payload() {
        let transport = MockMailTransport::new();
        let subscriber = subscriber(transport.clone());

        let outcome = subscriber.handle(b"{not json").await.unwrap();
        assert!(matches!(outcome, DeliveryOutcome::Rejected(_)));
        assert_eq!(transport.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_handle_missing_recipients_is_invalid() {
        let transport = MockMailTransport::new();
        let subscriber = subscriber(transport.clone());

        let outcome = subscriber
            .handle(br#"{"subject":"S","message":"M"}"#)
            .await
            .unwrap();
        assert_eq!(outcome, DeliveryOutcome::Invalid("no recipients".to_string()));
        assert_eq!(transport.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_process_consumes_every_terminal_state() {
        let subscriber = subscriber(MockMailTransport::failing("smtp down"));

        for payload in [
            encoded(&["a@x.com"]),
            encoded(&[]),
            b"[]".to_vec(),
            Vec::new(),
        ] {
            let result = subscriber
                .process(&delivery(&payload, DeliverySource::New))
                .await;
            assert!(result.is_ok());
        }
    }

    #[tokio::test]
    async fn test_redelivery_dispatches_again() {
        let transport = MockMailTransport::new();
        let subscriber = subscriber(transport.clone());
        let payload = encoded(&["a@x.com", "b@x.com"]);

        subscriber
            .process(&delivery(&payload, DeliverySource::New))
            .await
            .unwrap();
        subscriber
            .process(&delivery(&payload, DeliverySource::Pending))
            .await
            .unwrap();

        let sent = transport.sent().await;
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[0], sent[2]);
        assert_eq!(sent[1], sent[3]);
    }

    #[tokio::test]
    async fn test_health_check_reflects_transport() {
        assert!(subscriber(MockMailTransport::new()).health_check().await.unwrap());
        assert!(!subscriber(MockMailTransport::failing("down"))
            .health_check()
            .await
            .unwrap());
    }
}
