use serde::{Deserialize, Deserializer, Serialize};

/// One administrative notification request.
///
/// Immutable once built. Carries no id and no timestamp: identity and
/// ordering belong to the stream entry, not to the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    #[serde(rename = "adminEmails", default, deserialize_with = "null_as_default")]
    recipients: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    subject: String,
    #[serde(rename = "message", default, deserialize_with = "null_as_default")]
    body: String,
}

/// `null` on the wire decodes like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl NotificationEvent {
    pub fn new(
        recipients: impl IntoIterator<Item = impl Into<String>>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            recipients: recipients.into_iter().map(Into::into).collect(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

/// A single-recipient message handed to the mail transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// What happened to one recipient of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientResult {
    /// Accepted by the mail transport.
    Sent,
    /// Failed address-format validation; never reached the transport.
    InvalidAddress,
    /// The transport rejected or failed the send.
    TransportFailure(String),
}

impl RecipientResult {
    pub fn label(&self) -> &'static str {
        match self {
            RecipientResult::Sent => "sent",
            RecipientResult::InvalidAddress => "invalid_address",
            RecipientResult::TransportFailure(_) => "transport_failure",
        }
    }
}

/// Per-event tally of a fan-out.
///
/// `attempted == succeeded + skipped_invalid + failed_transport` holds after
/// every call to [`DispatchOutcome::record`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped_invalid: usize,
    pub failed_transport: usize,
}

impl DispatchOutcome {
    pub fn record(&mut self, result: &RecipientResult) {
        self.attempted += 1;
        match result {
            RecipientResult::Sent => self.succeeded += 1,
            RecipientResult::InvalidAddress => self.skipped_invalid += 1,
            RecipientResult::TransportFailure(_) => self.failed_transport += 1,
        }
    }

    /// Recipients that did not get the email, for whatever reason.
    pub fn undelivered(&self) -> usize {
        self.skipped_invalid + self.failed_transport
    }

    pub fn is_consistent(&self) -> bool {
        self.attempted == self.succeeded + self.skipped_invalid + self.failed_transport
    }
}

/// A change to a user account that administrators are told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserLifecycle {
    Created {
        username: String,
        email: String,
    },
    Edited {
        old_username: String,
        username: String,
        email: String,
    },
    Deleted {
        username: String,
        email: String,
    },
}

impl UserLifecycle {
    pub fn subject(&self) -> String {
        match self {
            UserLifecycle::Created { username, .. } => format!("User created {}", username),
            UserLifecycle::Edited { old_username, .. } => format!("User edited {}", old_username),
            UserLifecycle::Deleted { username, .. } => format!("User deleted {}", username),
        }
    }

    pub fn body(&self) -> String {
        match self {
            UserLifecycle::Created { username, email } => {
                format!("User created with name - {} and email - {}", username, email)
            }
            // Body names the account as it is after the edit
            UserLifecycle::Edited {
                username, email, ..
            } => format!("User edited with name - {} and email - {}", username, email),
            UserLifecycle::Deleted { username, email } => {
                format!("User deleted with name - {} and email - {}", username, email)
            }
        }
    }

    /// Address the change to the given administrators.
    pub fn into_event(self, admin_emails: Vec<String>) -> NotificationEvent {
        NotificationEvent::new(admin_emails, self.subject(), self.body())
    }
}
