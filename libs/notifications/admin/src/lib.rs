//! Administrative notification relay
//!
//! A producer publishes a `NotificationEvent` to a Redis stream; a worker in
//! the consumer group decodes each entry and sends one email per
//! administrator, tallying per-recipient results without letting one bad
//! address abort the rest.
//!
//! ## Components
//!
//! - **Codec**: `encode` / `decode` of the JSON envelope
//!   (`adminEmails`, `subject`, `message`)
//! - **Publisher**: encodes and appends to the topic through an `EventSink`
//! - **Subscriber**: `NotificationSubscriber`, a `stream_worker::StreamProcessor`
//! - **Dispatcher**: per-recipient validation and fan-out, producing a `DispatchOutcome`
//! - **Transports**: SMTP via lettre, and a mock for tests
//!
//! ## Usage
//!
//! ```ignore
//! use admin_notifications::{Dispatcher, NotificationSubscriber, RelayConfig, SmtpMailTransport};
//! use stream_worker::StreamWorker;
//!
//! let config = RelayConfig::from_env()?;
//! let dispatcher = Dispatcher::new(SmtpMailTransport::from_env()?, &config.sender_address);
//! let worker = StreamWorker::new(redis, NotificationSubscriber::new(dispatcher), config.worker_config());
//! worker.run(shutdown_rx).await?;
//! ```

pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod models;
pub mod publisher;
pub mod streams;
pub mod subscriber;
pub mod transport;

pub use codec::{decode, encode};
pub use config::RelayConfig;
pub use dispatcher::{is_valid_address, Dispatcher};
pub use error::{MailError, NotificationError, NotificationResult};
pub use models::{DispatchOutcome, NotificationEvent, OutgoingMail, RecipientResult, UserLifecycle};
pub use publisher::{AdminDirectory, EventSink, InMemoryChannel, Publisher, StaticAdminDirectory};
pub use streams::ServiceRequestsStream;
pub use subscriber::{DeliveryOutcome, NotificationSubscriber};
pub use transport::{MailTransport, MockMailTransport, SmtpConfig, SmtpMailTransport};
