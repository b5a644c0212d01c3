//! End-to-end relay tests against a real Redis stream.

use admin_notifications::{
    decode, Dispatcher, MockMailTransport, NotificationEvent, NotificationSubscriber, Publisher,
    RelayConfig, StaticAdminDirectory, UserLifecycle,
};
use redis::aio::ConnectionManager;
use redis::streams::StreamInfoGroupsReply;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;
use stream_worker::{StreamConsumer, StreamProducer, StreamWorker};
use test_utils::{TestAddresses, TestRedis};
use tokio::sync::watch;

const SENDER: &str = "noreply@example.com";

async fn create_connection_manager(connection_string: &str) -> ConnectionManager {
    let client = redis::Client::open(connection_string).expect("Failed to create Redis client");
    ConnectionManager::new(client)
        .await
        .expect("Failed to create ConnectionManager")
}

fn relay_config(topic: &str) -> RelayConfig {
    RelayConfig::new(SENDER)
        .with_topic(topic)
        .with_consumer_group("test-workers")
}

async fn wait_for_sends(transport: &MockMailTransport, count: usize) {
    for _ in 0..100 {
        if transport.sent_count().await >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("expected {} sends", count);
}

async fn wait_until_drained(consumer: &StreamConsumer) {
    for _ in 0..100 {
        if consumer.stream_info().await.unwrap().pending_count == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("entries were left pending");
}

/// Wait until the group has handed `entry_id` to a consumer.
async fn wait_until_delivered(mut conn: ConnectionManager, topic: &str, entry_id: &str) {
    for _ in 0..100 {
        let reply: StreamInfoGroupsReply = conn.xinfo_groups(topic).await.unwrap();
        if reply.groups.iter().any(|g| g.last_delivered_id == entry_id) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("entry {} was never delivered", entry_id);
}

#[tokio::test]
async fn test_publish_appends_to_topic() {
    let redis = TestRedis::new().await;
    let conn = create_connection_manager(redis.connection_string()).await;
    let config = relay_config("relay:publish");

    let publisher = Publisher::from_config(conn.clone(), &config);
    let event = NotificationEvent::new(["a@x.com"], "Hi", "Body");
    let entry_id = publisher.publish(&event).await.unwrap();
    assert!(entry_id.contains('-'));

    let consumer = StreamConsumer::new(
        Arc::new(conn),
        config.worker_config().with_consumer_id("reader").with_blocking(Some(100)),
    );
    consumer.ensure_consumer_group().await.unwrap();
    let pending = consumer.read_pending().await.unwrap();
    assert!(pending.is_empty());

    // Group created after the append starts at 0, so the entry is still new
    let events = consumer.read_new().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].stream_id, entry_id);
    assert_eq!(decode(&events[0].payload).unwrap(), event);
}

#[tokio::test]
async fn test_relay_fans_out_and_acks_everything() {
    let redis = TestRedis::new().await;
    let conn = create_connection_manager(redis.connection_string()).await;
    let addrs = TestAddresses::from_test_name("relay_fans_out");
    let config = relay_config(&addrs.stream("fanout"));

    let publisher = Publisher::new(StreamProducer::new(conn.clone(), &config.topic_name));
    publisher
        .notify([addrs.admin(1), "invalid-email".to_string(), addrs.admin(2)], "S", "M")
        .await
        .unwrap();
    publisher
        .notify_user_lifecycle(
            &StaticAdminDirectory::new(["root@example.com"]),
            UserLifecycle::Created {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
            },
        )
        .await
        .unwrap();
    // Neither of these reaches the mail transport
    publisher.notify(Vec::<String>::new(), "S", "M").await.unwrap();
    StreamProducer::new(conn.clone(), &config.topic_name)
        .append(b"not json")
        .await
        .unwrap();

    let transport = MockMailTransport::new();
    let subscriber = NotificationSubscriber::new(Dispatcher::new(transport.clone(), SENDER));
    let worker = Arc::new(StreamWorker::new(
        conn,
        subscriber,
        config
            .worker_config()
            .with_consumer_id("worker-1")
            .with_blocking(Some(100)),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = {
        let worker = worker.clone();
        tokio::spawn(async move { worker.run(shutdown_rx).await })
    };

    wait_for_sends(&transport, 3).await;
    wait_until_drained(worker.consumer()).await;
    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    let sent = transport.sent().await;
    let recipients: Vec<String> = sent.iter().map(|m| m.to.clone()).collect();
    assert_eq!(
        recipients,
        [addrs.admin(1), addrs.admin(2), "root@example.com".to_string()]
    );
    assert!(sent.iter().all(|m| m.from == SENDER));
    assert_eq!(sent[2].subject, "User created alice");

    let info = worker.consumer().stream_info().await.unwrap();
    assert_eq!(info.length, 4);
    assert_eq!(info.pending_count, 0);
}

#[tokio::test]
async fn test_transport_failures_do_not_cause_redelivery() {
    let redis = TestRedis::new().await;
    let conn = create_connection_manager(redis.connection_string()).await;
    let config = relay_config("relay:smtp-down");

    let entry_id = Publisher::from_config(conn.clone(), &config)
        .notify(["a@x.com"], "S", "M")
        .await
        .unwrap();

    let transport = MockMailTransport::failing("connection refused");
    let conn_for_checks = conn.clone();
    let worker = Arc::new(StreamWorker::new(
        conn,
        NotificationSubscriber::new(Dispatcher::new(transport.clone(), SENDER)),
        config
            .worker_config()
            .with_consumer_id("worker-1")
            .with_blocking(Some(100)),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = {
        let worker = worker.clone();
        tokio::spawn(async move { worker.run(shutdown_rx).await })
    };

    wait_until_delivered(conn_for_checks.clone(), &config.topic_name, &entry_id).await;
    wait_until_drained(worker.consumer()).await;
    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    assert_eq!(transport.sent_count().await, 0);
    assert_eq!(worker.consumer().stream_info().await.unwrap().length, 1);
}
