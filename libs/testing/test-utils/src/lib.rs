//! Shared test utilities
//!
//! - `TestRedis`: Redis container with automatic cleanup (feature: "redis")
//! - `TestAddresses`: deterministic admin address lists (always available)
//!
//! # Redis Testing
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { workspace = true, features = ["redis"] }
//! ```
//!
//! ```rust,ignore
//! use test_utils::TestRedis;
//!
//! #[tokio::test]
//! async fn my_redis_test() {
//!     let redis = TestRedis::new().await;
//!     let client = redis::Client::open(redis.connection_string()).unwrap();
//! }
//! ```

#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "redis")]
pub use redis::TestRedis;

/// Builder for deterministic recipient lists.
///
/// Addresses are derived from the test name so parallel tests sharing one
/// Redis never collide on stream or recipient names.
pub struct TestAddresses {
    prefix: String,
}

impl TestAddresses {
    /// Create from test name
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestAddresses;
    ///
    /// let addrs = TestAddresses::from_test_name("fan_out");
    /// assert_eq!(addrs.admin(1), "admin1.fan_out@example.com");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        Self {
            prefix: name.replace(|c: char| !c.is_ascii_alphanumeric() && c != '_', "_"),
        }
    }

    /// A valid admin address
    pub fn admin(&self, n: usize) -> String {
        format!("admin{}.{}@example.com", n, self.prefix)
    }

    /// `count` valid admin addresses
    pub fn admins(&self, count: usize) -> Vec<String> {
        (1..=count).map(|n| self.admin(n)).collect()
    }

    /// A stream name scoped to this test
    pub fn stream(&self, suffix: &str) -> String {
        format!("test:{}:{}", self.prefix, suffix)
    }
}
