//! Redis-backed tests for the producer, consumer group and delivery loop.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use stream_worker::{
    DeliverySource, StreamConsumer, StreamDef, StreamError, StreamEvent, StreamProcessor,
    StreamProducer, StreamWorker, WorkerConfig,
};
use test_utils::TestRedis;
use tokio::sync::{watch, Mutex};

async fn create_connection_manager(connection_string: &str) -> ConnectionManager {
    let client = redis::Client::open(connection_string).expect("Failed to create Redis client");
    ConnectionManager::new(client)
        .await
        .expect("Failed to create ConnectionManager")
}

fn test_config(stream: &str) -> WorkerConfig {
    WorkerConfig::new(stream, "test-group")
        .with_consumer_id("consumer-1")
        .with_blocking(Some(100))
}

/// Records payloads; optionally fails every call.
#[derive(Default)]
struct RecordingProcessor {
    seen: Mutex<Vec<Vec<u8>>>,
    fail: bool,
}

#[async_trait]
impl StreamProcessor for RecordingProcessor {
    async fn process(&self, event: &StreamEvent) -> Result<(), StreamError> {
        self.seen.lock().await.push(event.payload.clone());
        if self.fail {
            return Err(StreamError::processing("simulated failure"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

async fn wait_for(processor: &RecordingProcessor, count: usize) {
    for _ in 0..100 {
        if processor.seen.lock().await.len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("processor did not see {} messages in time", count);
}

#[tokio::test]
async fn test_append_read_ack() {
    let redis = TestRedis::new().await;
    let conn = create_connection_manager(redis.connection_string()).await;

    let consumer = StreamConsumer::new(Arc::new(conn.clone()), test_config("flow:basic"));
    consumer.ensure_consumer_group().await.unwrap();
    // Creating twice is fine
    consumer.ensure_consumer_group().await.unwrap();

    let producer = StreamProducer::new(conn, "flow:basic");
    let id = producer.append(br#"{"subject":"hello"}"#).await.unwrap();
    assert_eq!(producer.stream_length().await.unwrap(), 1);

    let events = consumer.read_new().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].stream_id, id);
    assert_eq!(events[0].payload, br#"{"subject":"hello"}"#);
    assert_eq!(events[0].source, DeliverySource::New);

    // Unacked: visible again as pending for the same consumer
    let pending = consumer.read_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].is_redelivery());

    consumer.ack(&id).await.unwrap();
    assert!(consumer.read_pending().await.unwrap().is_empty());
    assert_eq!(consumer.stream_info().await.unwrap().pending_count, 0);
}

#[tokio::test]
async fn test_abandoned_messages_are_claimed_by_peer() {
    let redis = TestRedis::new().await;
    let conn = Arc::new(create_connection_manager(redis.connection_string()).await);

    let crashed = StreamConsumer::new(conn.clone(), test_config("flow:claim"));
    crashed.ensure_consumer_group().await.unwrap();
    StreamProducer::from_arc(conn.clone(), "flow:claim")
        .append(b"{}")
        .await
        .unwrap();
    assert_eq!(crashed.read_new().await.unwrap().len(), 1);

    let peer = StreamConsumer::new(
        conn,
        test_config("flow:claim")
            .with_consumer_id("consumer-2")
            .with_claim_idle_ms(0),
    );
    let claimed = peer.claim_abandoned().await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].source, DeliverySource::Claimed);
}

#[tokio::test]
async fn test_worker_acks_even_when_processor_fails() {
    let redis = TestRedis::new().await;
    let conn = create_connection_manager(redis.connection_string()).await;

    let producer = StreamProducer::new(conn.clone(), "flow:failing");
    producer.append(b"first").await.unwrap();
    producer.append(b"second").await.unwrap();

    let processor = Arc::new(RecordingProcessor {
        fail: true,
        ..Default::default()
    });
    let worker = Arc::new(StreamWorker::with_arc_processor(
        Arc::new(conn),
        processor.clone(),
        test_config("flow:failing"),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = {
        let worker = worker.clone();
        tokio::spawn(async move { worker.run(shutdown_rx).await })
    };

    wait_for(&processor, 2).await;
    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    let seen = processor.seen.lock().await.clone();
    assert_eq!(seen, vec![b"first".to_vec(), b"second".to_vec()]);

    // Failed deliveries are consumed, not left for redelivery
    let info = worker.consumer().stream_info().await.unwrap();
    assert_eq!(info.length, 2);
    assert_eq!(info.pending_count, 0);
}

#[tokio::test]
async fn test_entry_without_payload_field_is_delivered_empty() {
    let redis = TestRedis::new().await;
    let conn = create_connection_manager(redis.connection_string()).await;

    let consumer = StreamConsumer::new(Arc::new(conn.clone()), test_config("flow:foreign"));
    consumer.ensure_consumer_group().await.unwrap();

    let mut raw = conn.clone();
    let _: String = redis::cmd("XADD")
        .arg("flow:foreign")
        .arg("*")
        .arg("job")
        .arg("{}")
        .query_async(&mut raw)
        .await
        .unwrap();

    let events = consumer.read_new().await.unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].payload.is_empty());
}

struct PolledStream;

impl StreamDef for PolledStream {
    const STREAM_NAME: &'static str = "flow:polled";
    const CONSUMER_GROUP: &'static str = "polled-group";
    const MAX_LENGTH: i64 = 1_000;
}

#[tokio::test]
async fn test_polling_worker_delivers_in_order() {
    let redis = TestRedis::new().await;
    let conn = create_connection_manager(redis.connection_string()).await;

    let producer = StreamProducer::from_stream_def::<PolledStream>(conn.clone());
    assert_eq!(producer.stream_name(), "flow:polled");

    let processor = Arc::new(RecordingProcessor::default());
    let config = WorkerConfig::from_stream_def::<PolledStream>()
        .with_blocking(None)
        .with_poll_interval_ms(50);
    let worker = Arc::new(StreamWorker::with_arc_processor(
        Arc::new(conn),
        processor.clone(),
        config,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = {
        let worker = worker.clone();
        tokio::spawn(async move { worker.run(shutdown_rx).await })
    };

    for payload in [&b"one"[..], &b"two"[..], &b"three"[..]] {
        producer.append(payload).await.unwrap();
    }

    wait_for(&processor, 3).await;
    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    let seen = processor.seen.lock().await.clone();
    assert_eq!(seen, vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]);
}

#[tokio::test]
async fn test_worker_with_oversized_concurrency_still_delivers() {
    let redis = TestRedis::new().await;
    let conn = create_connection_manager(redis.connection_string()).await;

    let producer = StreamProducer::new(conn.clone(), "flow:unbounded");
    producer.append(b"only").await.unwrap();

    let mut config = test_config("flow:unbounded");
    config.max_concurrent_jobs = usize::MAX;

    let processor = Arc::new(RecordingProcessor::default());
    let worker = Arc::new(StreamWorker::with_arc_processor(
        Arc::new(conn),
        processor.clone(),
        config,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = {
        let worker = worker.clone();
        tokio::spawn(async move { worker.run(shutdown_rx).await })
    };

    wait_for(&processor, 1).await;
    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    let info = worker.consumer().stream_info().await.unwrap();
    assert_eq!(info.pending_count, 0);
}
