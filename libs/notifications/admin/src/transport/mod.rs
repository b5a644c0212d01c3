//! Mail transport implementations

pub mod mock;
pub mod smtp;

pub use mock::MockMailTransport;
pub use smtp::{SmtpConfig, SmtpMailTransport};

use crate::error::MailError;
use crate::models::OutgoingMail;
use async_trait::async_trait;

/// Sends one email to one recipient.
///
/// Implementations must be safe to call concurrently.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Send a single message
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;

    /// Check that the mail server is reachable
    async fn health_check(&self) -> Result<(), MailError>;

    /// Get transport name
    fn name(&self) -> &'static str;
}
