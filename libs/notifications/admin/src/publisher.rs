//! Publishing side of the relay.
//!
//! `Publisher` encodes events and appends them to the notification topic.
//! It returns once the broker has acknowledged the append and never waits
//! for a consumer.

use crate::codec;
use crate::config::RelayConfig;
use crate::error::{NotificationError, NotificationResult};
use crate::models::{NotificationEvent, UserLifecycle};
use crate::streams::ServiceRequestsStream;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use stream_worker::{StreamDef, StreamProducer};
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Durable destination for encoded events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Append one payload, returning the broker's id for it.
    async fn append(&self, payload: &[u8]) -> NotificationResult<String>;
}

#[async_trait]
impl EventSink for StreamProducer {
    async fn append(&self, payload: &[u8]) -> NotificationResult<String> {
        Ok(StreamProducer::append(self, payload).await?)
    }
}

/// In-process sink that keeps published payloads in memory.
#[derive(Clone, Default)]
pub struct InMemoryChannel {
    payloads: Arc<Mutex<Vec<Vec<u8>>>>,
    unavailable: bool,
}

impl InMemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel that refuses every append.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub async fn payloads(&self) -> Vec<Vec<u8>> {
        self.payloads.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.payloads.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.payloads.lock().await.is_empty()
    }
}

#[async_trait]
impl EventSink for InMemoryChannel {
    async fn append(&self, payload: &[u8]) -> NotificationResult<String> {
        if self.unavailable {
            return Err(NotificationError::Transport("channel unavailable".to_string()));
        }
        let mut payloads = self.payloads.lock().await;
        payloads.push(payload.to_vec());
        Ok(format!("{}-0", payloads.len()))
    }
}

/// Source of the administrator addresses lifecycle events go to.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdminDirectory: Send + Sync {
    /// Email addresses of every user with the admin role
    async fn admin_emails(&self) -> NotificationResult<Vec<String>>;
}

/// Fixed list of administrators.
#[derive(Debug, Clone, Default)]
pub struct StaticAdminDirectory {
    emails: Vec<String>,
}

impl StaticAdminDirectory {
    pub fn new(emails: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            emails: emails.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl AdminDirectory for StaticAdminDirectory {
    async fn admin_emails(&self) -> NotificationResult<Vec<String>> {
        Ok(self.emails.clone())
    }
}

/// Encodes events and hands them to the broker.
pub struct Publisher<S: EventSink> {
    sink: S,
}

impl Publisher<StreamProducer> {
    /// Publisher appending to the configured topic.
    pub fn from_config(redis: ConnectionManager, config: &RelayConfig) -> Self {
        Self::new(
            StreamProducer::new(redis, &config.topic_name)
                .with_max_length(ServiceRequestsStream::MAX_LENGTH),
        )
    }
}

impl<S: EventSink> Publisher<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Encode and append one event; returns the broker entry id.
    ///
    /// Nothing is written when encoding fails.
    pub async fn publish(&self, event: &NotificationEvent) -> NotificationResult<String> {
        let payload = codec::encode(event)?;

        match self.sink.append(&payload).await {
            Ok(entry_id) => {
                debug!(
                    entry_id = %entry_id,
                    recipients = event.recipients().len(),
                    subject = %event.subject(),
                    "Notification published"
                );
                Ok(entry_id)
            }
            Err(e) => {
                error!(error = %e, subject = %event.subject(), "Failed to publish notification");
                Err(e)
            }
        }
    }

    /// Build an event from its parts and publish it.
    pub async fn notify(
        &self,
        recipients: impl IntoIterator<Item = impl Into<String>>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> NotificationResult<String> {
        self.publish(&NotificationEvent::new(recipients, subject, body))
            .await
    }

    /// Tell every administrator about a user account change.
    pub async fn notify_user_lifecycle(
        &self,
        directory: &dyn AdminDirectory,
        change: UserLifecycle,
    ) -> NotificationResult<String> {
        let admins = directory.admin_emails().await?;
        self.publish(&change.into_event(admins)).await
    }
}
