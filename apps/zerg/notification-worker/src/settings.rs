use core_config::{env_parse_or, ConfigError, FromEnv};
use stream_worker::WorkerConfig;

/// Delivery loop tunables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerSettings {
    pub batch_size: usize,
    /// `0` switches from a blocking read to polling.
    pub block_ms: u64,
    pub max_concurrent: usize,
    pub claim_idle_ms: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            block_ms: 5000,
            max_concurrent: 1,
            claim_idle_ms: 30_000,
        }
    }
}

impl WorkerSettings {
    pub fn apply(&self, config: WorkerConfig) -> WorkerConfig {
        let blocking = (self.block_ms > 0).then_some(self.block_ms);
        config
            .with_batch_size(self.batch_size)
            .with_blocking(blocking)
            .with_max_concurrent_jobs(self.max_concurrent)
            .with_claim_idle_ms(self.claim_idle_ms)
    }
}

impl FromEnv for WorkerSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            batch_size: env_parse_or("NOTIFY_BATCH_SIZE", defaults.batch_size)?,
            block_ms: env_parse_or("NOTIFY_BLOCK_MS", defaults.block_ms)?,
            max_concurrent: env_parse_or("NOTIFY_MAX_CONCURRENT", defaults.max_concurrent)?,
            claim_idle_ms: env_parse_or("NOTIFY_CLAIM_IDLE_MS", defaults.claim_idle_ms)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: [&str; 4] = [
        "NOTIFY_BATCH_SIZE",
        "NOTIFY_BLOCK_MS",
        "NOTIFY_MAX_CONCURRENT",
        "NOTIFY_CLAIM_IDLE_MS",
    ];

    #[test]
    fn test_settings_defaults() {
        temp_env::with_vars_unset(KEYS, || {
            assert_eq!(WorkerSettings::from_env().unwrap(), WorkerSettings::default());
        });
    }

    #[test]
    fn test_settings_from_env() {
        temp_env::with_vars(
            [
                ("NOTIFY_BATCH_SIZE", Some("50")),
                ("NOTIFY_BLOCK_MS", Some("0")),
                ("NOTIFY_MAX_CONCURRENT", Some("4")),
                ("NOTIFY_CLAIM_IDLE_MS", Some("60000")),
            ],
            || {
                let settings = WorkerSettings::from_env().unwrap();
                assert_eq!(settings.batch_size, 50);
                assert_eq!(settings.max_concurrent, 4);

                let config = settings.apply(WorkerConfig::new("service-requests", "g"));
                assert_eq!(config.batch_size, 50);
                assert!(!config.is_blocking());
                assert_eq!(config.max_concurrent_jobs, 4);
                assert_eq!(config.claim_idle_ms, 60_000);
            },
        );
    }

    #[test]
    fn test_settings_reject_garbage() {
        temp_env::with_var("NOTIFY_MAX_CONCURRENT", Some("many"), || {
            assert!(matches!(
                WorkerSettings::from_env(),
                Err(ConfigError::ParseError { .. })
            ));
        });
    }

    #[test]
    fn test_default_settings_keep_blocking_reads() {
        let config = WorkerSettings::default().apply(WorkerConfig::new("s", "g"));
        assert_eq!(config.block_timeout_ms, Some(5000));
        assert_eq!(config.max_concurrent_jobs, 1);
    }
}
