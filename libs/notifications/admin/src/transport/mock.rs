//! Mock mail transport for testing

use super::MailTransport;
use crate::error::MailError;
use crate::models::OutgoingMail;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Mock transport that captures sent mail
#[derive(Clone, Default)]
pub struct MockMailTransport {
    sent: Arc<Mutex<Vec<OutgoingMail>>>,
    fail_all: Option<String>,
    fail_for: HashSet<String>,
}

impl MockMailTransport {
    /// Create a new mock transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock transport that always fails
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_all: Some(message.into()),
            ..Self::default()
        }
    }

    /// Create a mock transport that fails only for the given addresses
    pub fn failing_for<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fail_for: addresses.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Get all successfully sent mail, in send order
    pub async fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().await.clone()
    }

    /// Get the count of sent mail
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Clear all sent mail
    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }

    /// Check if mail was sent to a specific address
    pub async fn was_sent_to(&self, address: &str) -> bool {
        self.sent.lock().await.iter().any(|m| m.to == address)
    }
}

#[async_trait]
impl MailTransport for MockMailTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        if let Some(message) = &self.fail_all {
            return Err(MailError::Send(message.clone()));
        }
        if self.fail_for.contains(&mail.to) {
            return Err(MailError::Send(format!("mailbox unavailable: {}", mail.to)));
        }

        self.sent.lock().await.push(mail.clone());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), MailError> {
        if self.fail_all.is_some() {
            return Err(MailError::Send("Mock health check failed".to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
