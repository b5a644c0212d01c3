//! Fan-out dispatcher.
//!
//! Turns one `NotificationEvent` into one email per recipient. Recipients are
//! handled independently and in event order: an invalid address or a failed
//! send is recorded and the loop moves on to the next recipient.

use crate::error::{NotificationError, NotificationResult};
use crate::models::{DispatchOutcome, NotificationEvent, OutgoingMail, RecipientResult};
use crate::transport::MailTransport;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, error, info, warn};

// After the `@`: anything but a line terminator (\n, \r, NEL, LS, PS)
const ADDRESS_PATTERN: &str = r"^[A-Za-z0-9+_.-]+@([^\n\r\x{85}\x{2028}\x{2029}]+)$";

static ADDRESS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ADDRESS_PATTERN).expect("valid regex"));

/// Permissive address check: a non-empty local part of `[A-Za-z0-9+_.-]`,
/// an `@`, and at least one character after it. Line terminators are never
/// part of an address.
pub fn is_valid_address(address: &str) -> bool {
    ADDRESS_REGEX.is_match(address)
}

/// Sends one email per recipient of an event.
///
/// Holds no mutable state, so one dispatcher can serve concurrent events.
pub struct Dispatcher<T: MailTransport> {
    transport: Arc<T>,
    sender_address: String,
}

impl<T: MailTransport> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            sender_address: self.sender_address.clone(),
        }
    }
}

impl<T: MailTransport> Dispatcher<T> {
    pub fn new(transport: T, sender_address: impl Into<String>) -> Self {
        Self::from_arc(Arc::new(transport), sender_address)
    }

    pub fn from_arc(transport: Arc<T>, sender_address: impl Into<String>) -> Self {
        Self {
            transport,
            sender_address: sender_address.into(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn sender_address(&self) -> &str {
        &self.sender_address
    }

    /// The single-recipient email sent for `event`.
    pub fn build_message(&self, recipient: &str, event: &NotificationEvent) -> OutgoingMail {
        OutgoingMail {
            from: self.sender_address.clone(),
            to: recipient.to_string(),
            subject: event.subject().to_string(),
            body: event.body().to_string(),
        }
    }

    /// Send `event` to each of its recipients.
    ///
    /// Fails only when the event has no recipients at all; per-recipient
    /// problems are reported through the returned outcome.
    pub async fn dispatch(&self, event: &NotificationEvent) -> NotificationResult<DispatchOutcome> {
        // Reported by the caller
        if event.recipients().is_empty() {
            return Err(NotificationError::no_recipients());
        }

        debug!(
            recipients = event.recipients().len(),
            subject = %event.subject(),
            "Dispatching notification"
        );

        let mut outcome = DispatchOutcome::default();
        for recipient in event.recipients() {
            let result = self.deliver_to(recipient, event).await;
            metrics::counter!(
                "admin_notifications_recipients_total",
                "result" => result.label()
            )
            .increment(1);
            outcome.record(&result);
        }

        if outcome.undelivered() > 0 {
            warn!(
                attempted = outcome.attempted,
                succeeded = outcome.succeeded,
                skipped_invalid = outcome.skipped_invalid,
                failed_transport = outcome.failed_transport,
                "Notification partially delivered"
            );
        } else {
            info!(
                attempted = outcome.attempted,
                succeeded = outcome.succeeded,
                "Notification delivered"
            );
        }

        Ok(outcome)
    }

    async fn deliver_to(&self, recipient: &str, event: &NotificationEvent) -> RecipientResult {
        if !is_valid_address(recipient) {
            warn!(recipient = %recipient, "Skipping invalid email address");
            return RecipientResult::InvalidAddress;
        }

        let mail = self.build_message(recipient, event);
        match self.transport.send(&mail).await {
            Ok(()) => {
                debug!(recipient = %recipient, transport = self.transport.name(), "Email sent");
                RecipientResult::Sent
            }
            Err(e) => {
                error!(
                    recipient = %recipient,
                    transport = self.transport.name(),
                    error = %e,
                    "Failed to send email"
                );
                RecipientResult::TransportFailure(e.to_string())
            }
        }
    }
}
