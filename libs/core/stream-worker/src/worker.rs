//! The generic delivery loop.
//!
//! `StreamWorker` reads entries for its consumer group and hands each one to
//! a `StreamProcessor`. Delivery is at-least-once: an entry is acknowledged
//! only after the processor returns, so a crash mid-processing leaves it
//! pending and it is delivered again (to this consumer on restart, or to a
//! peer via `XAUTOCLAIM`). Once the processor returns, the entry is
//! acknowledged regardless of the result.

use crate::config::WorkerConfig;
use crate::consumer::StreamConsumer;
use crate::error::StreamError;
use crate::event::StreamEvent;
use crate::metrics::{DeliveryStatus, StreamMetrics};
use crate::registry::StreamProcessor;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn, Instrument};

const MAX_BACKOFF_SECS: u64 = 30;

/// Generic stream worker that hands deliveries to a processor.
///
/// # Concurrency
///
/// By default deliveries are processed one at a time (`max_concurrent_jobs = 1`).
/// Raising it lets independent entries of a batch run concurrently; the
/// processor must then be safe to call concurrently.
pub struct StreamWorker<P>
where
    P: StreamProcessor,
{
    consumer: Arc<StreamConsumer>,
    processor: Arc<P>,
    config: WorkerConfig,
    concurrency: Arc<Semaphore>,
    metrics: StreamMetrics,
}

impl<P> StreamWorker<P>
where
    P: StreamProcessor + 'static,
{
    /// Create a new stream worker.
    pub fn new(redis: ConnectionManager, processor: P, config: WorkerConfig) -> Self {
        Self::with_arc_processor(Arc::new(redis), Arc::new(processor), config)
    }

    /// Create a new stream worker sharing an existing connection and processor.
    pub fn with_arc_processor(
        redis: Arc<ConnectionManager>,
        processor: Arc<P>,
        config: WorkerConfig,
    ) -> Self {
        let consumer = Arc::new(StreamConsumer::new(redis, config.clone()));
        let concurrency = Arc::new(Semaphore::new(
            config.max_concurrent_jobs.clamp(1, Semaphore::MAX_PERMITS),
        ));
        let metrics = StreamMetrics::new(&config.stream_name, processor.name());

        Self {
            consumer,
            processor,
            config,
            concurrency,
            metrics,
        }
    }

    /// Get a reference to the consumer for health checks.
    pub fn consumer(&self) -> &StreamConsumer {
        &self.consumer
    }

    /// Run the worker loop until the shutdown flag flips to `true`.
    ///
    /// Deliveries already handed to the processor run to completion before
    /// the loop observes the flag.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), StreamError> {
        info!(
            consumer_id = %self.config.consumer_id,
            stream = %self.config.stream_name,
            group = %self.config.consumer_group,
            processor = %self.processor.name(),
            max_concurrent_jobs = self.config.max_concurrent_jobs,
            blocking = self.config.is_blocking(),
            "Starting stream worker"
        );

        self.consumer.ensure_consumer_group().await?;

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let claim_interval = Duration::from_millis(self.config.claim_idle_ms.max(1_000));
        let mut last_claim = Instant::now();
        let mut consecutive_errors: u32 = 0;

        loop {
            if *shutdown.borrow() {
                info!("Received shutdown signal, stopping worker");
                break;
            }

            match self.process_batch().await {
                Ok(_) => {
                    if consecutive_errors > 0 {
                        info!(consecutive_errors, "Connection recovered");
                        consecutive_errors = 0;
                    }
                }
                Err(e) => {
                    consecutive_errors += 1;

                    if e.is_nogroup_error() {
                        warn!("Consumer group missing, recreating");
                        if let Err(create_err) = self.consumer.ensure_consumer_group().await {
                            error!(error = %create_err, "Failed to recreate consumer group");
                        }
                    } else if e.is_connection_error() {
                        let backoff_secs =
                            std::cmp::min(2u64.pow(consecutive_errors.min(5)), MAX_BACKOFF_SECS);
                        warn!(
                            error = %e,
                            consecutive_errors,
                            backoff_secs,
                            "Redis connection error, backing off"
                        );
                        tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                    } else if e.is_timeout() {
                        debug!(error = %e, "Operation timeout, retrying");
                    } else {
                        error!(error = %e, "Error reading batch");
                    }

                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            }

            if last_claim.elapsed() >= claim_interval {
                if let Err(e) = self.claim_and_process().await {
                    debug!(error = %e, "Error claiming abandoned messages");
                }
                last_claim = Instant::now();
            }

            // In blocking mode the server-side BLOCK is the wait
            if !self.config.is_blocking() {
                tokio::select! {
                    _ = shutdown.changed() => {}
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
        }

        info!("Stream worker stopped");
        Ok(())
    }

    /// Read pending then new entries and deliver them.
    async fn process_batch(&self) -> Result<(), StreamError> {
        let pending = self.consumer.read_pending().await?;
        if !pending.is_empty() {
            warn!(count = pending.len(), "Redelivering own pending messages");
        }
        let new_messages = self.consumer.read_new().await?;

        let events: Vec<StreamEvent> = pending.into_iter().chain(new_messages).collect();
        if !events.is_empty() {
            self.deliver_all(events).await;
        }
        Ok(())
    }

    async fn claim_and_process(&self) -> Result<(), StreamError> {
        let claimed = self.consumer.claim_abandoned().await?;
        if !claimed.is_empty() {
            self.metrics.messages_claimed(claimed.len());
            self.deliver_all(claimed).await;
        }
        Ok(())
    }

    /// Deliver a batch, at most `max_concurrent_jobs` at a time.
    ///
    /// Permits are taken in batch order, so with a single permit entries are
    /// handled strictly one after another.
    async fn deliver_all(&self, events: Vec<StreamEvent>) {
        let mut join_set: JoinSet<()> = JoinSet::new();

        for event in events {
            let Ok(permit) = Arc::clone(&self.concurrency).acquire_owned().await else {
                error!("Concurrency semaphore closed, dropping batch");
                break;
            };

            let consumer = Arc::clone(&self.consumer);
            let processor = Arc::clone(&self.processor);
            let metrics = self.metrics.clone();
            let span = tracing::info_span!("delivery", stream_id = %event.stream_id);

            join_set.spawn(
                async move {
                    Self::deliver(consumer, processor, metrics, event).await;
                    drop(permit);
                }
                .instrument(span),
            );
        }

        while join_set.join_next().await.is_some() {}
    }

    /// Hand one entry to the processor, then acknowledge it.
    ///
    /// The processor runs in its own task so that a panic is contained and
    /// reported like any other failure.
    async fn deliver(
        consumer: Arc<StreamConsumer>,
        processor: Arc<P>,
        metrics: StreamMetrics,
        event: StreamEvent,
    ) {
        metrics.message_received();
        let stream_id = event.stream_id.clone();
        let redelivery = event.is_redelivery();
        let start = Instant::now();

        debug!(
            stream_id = %stream_id,
            redelivery,
            age_ms = event.age_ms(),
            "Delivering message"
        );

        let outcome = tokio::spawn(
            async move { processor.process(&event).await }.in_current_span(),
        )
        .await;

        let status = match outcome {
            Ok(Ok(())) => DeliveryStatus::Success,
            Ok(Err(e)) => {
                error!(stream_id = %stream_id, error = %e, "Processor failed, message consumed");
                DeliveryStatus::Failed
            }
            Err(join_err) => {
                error!(
                    stream_id = %stream_id,
                    error = %join_err,
                    "Processor aborted unexpectedly, message consumed"
                );
                DeliveryStatus::Failed
            }
        };
        metrics.message_processed(status, start.elapsed());

        if let Err(e) = consumer.ack(&stream_id).await {
            // Left pending: it will be delivered again
            error!(stream_id = %stream_id, error = %e, "Failed to ACK message");
        }
    }
}
