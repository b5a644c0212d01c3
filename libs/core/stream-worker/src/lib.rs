//! Stream Worker Framework
//!
//! A small Redis Streams binding for "one topic, one consumer group"
//! message relays.
//!
//! ## Features
//!
//! - **Producer**: `StreamProducer` appends opaque payloads with `XADD MAXLEN ~`
//! - **Consumer groups**: horizontal scaling with Redis consumer groups
//! - **At-least-once**: own pending entries are re-read and idle entries of
//!   crashed peers are claimed with `XAUTOCLAIM`
//! - **Ack after callback**: every delivery is acknowledged once the
//!   processor returns, whatever it returned; there is no retry or DLQ
//! - **Prometheus metrics** and **health endpoints**
//!
//! ## Example
//!
//! ```ignore
//! use stream_worker::{StreamWorker, StreamProcessor, WorkerConfig};
//!
//! let config = WorkerConfig::new("service-requests", "notification-workers");
//! let worker = StreamWorker::new(redis, processor, config);
//! worker.run(shutdown_rx).await?;
//! ```

mod config;
mod consumer;
mod error;
mod event;
mod health;
pub mod metrics;
mod producer;
mod registry;
mod worker;

pub use config::WorkerConfig;
pub use consumer::{StreamConsumer, StreamInfo};
pub use error::StreamError;
pub use event::{DeliverySource, StreamEvent};
pub use health::{health_router, HealthState};
pub use metrics::{init_metrics, StreamMetrics};
pub use producer::StreamProducer;
pub use registry::{StreamDef, StreamProcessor, PAYLOAD_FIELD};
pub use worker::StreamWorker;
