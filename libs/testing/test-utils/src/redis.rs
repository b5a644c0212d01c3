//! Redis test infrastructure
//!
//! Provides a `TestRedis` helper that creates a Redis container for testing.

use redis::Client;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::redis::Redis;

/// Test Redis wrapper that ensures proper cleanup
///
/// The container is automatically stopped and removed when this struct is dropped.
pub struct TestRedis {
    #[allow(dead_code)]
    container: ContainerAsync<Redis>,
    pub connection_string: String,
}

impl TestRedis {
    /// Create a new test Redis instance (Redis 8 Alpine, which has XAUTOCLAIM).
    pub async fn new() -> Self {
        let container = Redis::default()
            .with_tag("8-alpine")
            .start()
            .await
            .expect("Failed to start Redis container");

        let host_port = container
            .get_host_port_ipv4(6379)
            .await
            .expect("Failed to get Redis port");

        let connection_string = format!("redis://127.0.0.1:{}", host_port);

        let client =
            Client::open(connection_string.clone()).expect("Failed to create Redis client");

        let mut connection = client
            .get_multiplexed_async_connection()
            .await
            .expect("Failed to connect to Redis");
        let _: String = redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .expect("Redis did not answer PING");

        tracing::info!(port = host_port, "Test Redis ready (Redis 8-alpine)");

        Self {
            container,
            connection_string,
        }
    }

    /// Get the connection string for `ConnectionManager` construction
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

impl Drop for TestRedis {
    fn drop(&mut self) {
        tracing::debug!("Cleaning up test Redis container");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::AsyncCommands;

    #[tokio::test]
    async fn test_stream_commands_available() {
        let redis = TestRedis::new().await;
        let client = Client::open(redis.connection_string()).unwrap();
        let mut conn = client.get_multiplexed_async_connection().await.unwrap();

        let _: String = conn
            .xadd("smoke:stream", "*", &[("payload", "{}")])
            .await
            .unwrap();
        let len: usize = conn.xlen("smoke:stream").await.unwrap();
        assert_eq!(len, 1);
    }
}
