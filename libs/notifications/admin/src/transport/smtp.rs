//! SMTP mail transport using lettre

use super::MailTransport;
use crate::error::MailError;
use crate::models::OutgoingMail;
use async_trait::async_trait;
use core_config::{env_flag, env_or_default, env_parse_or, env_required, ConfigError, FromEnv};
use eyre::{Result, WrapErr};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

/// SMTP connection settings
#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub use_tls: bool,
}

impl SmtpConfig {
    /// Local Mailpit/MailHog catcher: no TLS, no auth.
    pub fn mailhog() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_or_default("SMTP_HOST", "localhost"),
            port: env_parse_or("SMTP_PORT", 1025)?,
            username: String::new(),
            password: String::new(),
            use_tls: false,
        })
    }
}

impl FromEnv for SmtpConfig {
    /// Requires SMTP_HOST; port defaults to 587 with TLS on.
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_required("SMTP_HOST")?,
            port: env_parse_or("SMTP_PORT", 587)?,
            username: env_or_default("SMTP_USERNAME", ""),
            password: env_or_default("SMTP_PASSWORD", ""),
            use_tls: env_flag("SMTP_USE_TLS", true),
        })
    }
}

/// SMTP mail transport
pub struct SmtpMailTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailTransport {
    /// Create a new SMTP transport
    pub fn new(config: SmtpConfig) -> Result<Self> {
        let transport = if config.use_tls {
            let creds = Credentials::new(config.username.clone(), config.password.clone());
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .wrap_err("Failed to create SMTP relay")?
                .credentials(creds)
                .port(config.port)
                .build()
        } else if !config.username.is_empty() {
            let creds = Credentials::new(config.username.clone(), config.password.clone());
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .credentials(creds)
                .port(config.port)
                .build()
        } else {
            // No auth (for Mailpit/Mailhog)
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .port(config.port)
                .build()
        };

        tracing::debug!(
            host = %config.host,
            port = config.port,
            tls = config.use_tls,
            "SMTP transport configured"
        );

        Ok(Self { transport })
    }

    /// Create a transport for Mailhog/Mailpit (local development)
    pub fn mailhog() -> Result<Self> {
        Self::new(SmtpConfig::mailhog().wrap_err("Invalid local SMTP configuration")?)
    }

    /// Create a transport from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(SmtpConfig::from_env().wrap_err("Invalid SMTP configuration")?)
    }

    fn build_message(mail: &OutgoingMail) -> Result<Message, MailError> {
        let from: Mailbox = mail
            .from
            .parse()
            .map_err(|e| MailError::Build(format!("invalid from address {}: {}", mail.from, e)))?;
        let to: Mailbox = mail
            .to
            .parse()
            .map_err(|e| MailError::Build(format!("invalid to address {}: {}", mail.to, e)))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(&mail.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body.clone())
            .map_err(|e| MailError::Build(e.to_string()))
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let message = Self::build_message(mail)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Send(e.to_string()))?;

        tracing::debug!(to = %mail.to, subject = %mail.subject, "Mail accepted by SMTP server");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), MailError> {
        let reachable = self
            .transport
            .test_connection()
            .await
            .map_err(|e| MailError::Send(format!("SMTP health check failed: {}", e)))?;

        if reachable {
            Ok(())
        } else {
            Err(MailError::Send("SMTP server did not accept the connection".to_string()))
        }
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
