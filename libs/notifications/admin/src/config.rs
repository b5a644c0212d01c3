use crate::streams::ServiceRequestsStream;
use core_config::{env_or_default, env_required, ConfigError, FromEnv};
use stream_worker::{StreamDef, WorkerConfig};

/// Where events are published, who consumes them and who they come from.
///
/// Injected into the publisher (topic), the worker (topic + group) and the
/// dispatcher (sender).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayConfig {
    pub topic_name: String,
    pub consumer_group: String,
    pub sender_address: String,
}

impl RelayConfig {
    /// Default topic and consumer group with the given sender.
    pub fn new(sender_address: impl Into<String>) -> Self {
        Self {
            topic_name: ServiceRequestsStream::STREAM_NAME.to_string(),
            consumer_group: ServiceRequestsStream::CONSUMER_GROUP.to_string(),
            sender_address: sender_address.into(),
        }
    }

    pub fn with_topic(mut self, topic_name: impl Into<String>) -> Self {
        self.topic_name = topic_name.into();
        self
    }

    pub fn with_consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = consumer_group.into();
        self
    }

    /// Worker settings for this topic and group; tunables keep their defaults.
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig::new(&self.topic_name, &self.consumer_group)
    }
}

impl FromEnv for RelayConfig {
    /// Requires NOTIFY_SENDER_ADDRESS; topic and group have defaults.
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            topic_name: env_or_default("NOTIFY_TOPIC", ServiceRequestsStream::STREAM_NAME),
            consumer_group: env_or_default(
                "NOTIFY_CONSUMER_GROUP",
                ServiceRequestsStream::CONSUMER_GROUP,
            ),
            sender_address: env_required("NOTIFY_SENDER_ADDRESS")?,
        })
    }
}
