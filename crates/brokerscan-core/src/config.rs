//! Planner configuration from environment variables.

use std::time::Duration;

use anyhow::{ensure, Context, Result};

pub const DEFAULT_MIN_BYTES_PER_BROKER_SCANNER: u64 = 64 * 1024 * 1024;
pub const DEFAULT_MAX_BROKER_CONCURRENCY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerConfig {
    /// Minimum input bytes one scan task should read.
    pub min_bytes_per_broker_scanner: u64,
    /// Upper bound on scan tasks per statement, regardless of worker count.
    pub max_broker_concurrency: usize,
    /// Pooled connections kept per broker address.
    pub broker_pool_max_per_address: usize,
    /// How long a borrow waits on an exhausted pool.
    pub broker_borrow_timeout: Duration,
    /// Host used to pick a broker instance for file discovery.
    pub local_host: String,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            min_bytes_per_broker_scanner: DEFAULT_MIN_BYTES_PER_BROKER_SCANNER,
            max_broker_concurrency: DEFAULT_MAX_BROKER_CONCURRENCY,
            broker_pool_max_per_address: 8,
            broker_borrow_timeout: Duration::from_millis(5000),
            local_host: "127.0.0.1".to_string(),
        }
    }
}

impl PlannerConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            min_bytes_per_broker_scanner: std::env::var("MIN_BYTES_PER_BROKER_SCANNER")
                .unwrap_or_else(|_| DEFAULT_MIN_BYTES_PER_BROKER_SCANNER.to_string())
                .parse()
                .context("Invalid MIN_BYTES_PER_BROKER_SCANNER")?,
            max_broker_concurrency: std::env::var("MAX_BROKER_CONCURRENCY")
                .unwrap_or_else(|_| DEFAULT_MAX_BROKER_CONCURRENCY.to_string())
                .parse()
                .context("Invalid MAX_BROKER_CONCURRENCY")?,
            broker_pool_max_per_address: std::env::var("BROKER_POOL_MAX_PER_ADDRESS")
                .unwrap_or_else(|_| "8".to_string())
                .parse()
                .context("Invalid BROKER_POOL_MAX_PER_ADDRESS")?,
            broker_borrow_timeout: Duration::from_millis(
                std::env::var("BROKER_BORROW_TIMEOUT_MS")
                    .unwrap_or_else(|_| "5000".to_string())
                    .parse()
                    .context("Invalid BROKER_BORROW_TIMEOUT_MS")?,
            ),
            local_host: std::env::var("BROKER_LOCAL_HOST")
                .unwrap_or_else(|_| "127.0.0.1".to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.min_bytes_per_broker_scanner > 0,
            "MIN_BYTES_PER_BROKER_SCANNER must be positive"
        );
        ensure!(
            self.max_broker_concurrency > 0,
            "MAX_BROKER_CONCURRENCY must be positive"
        );
        ensure!(
            self.broker_pool_max_per_address > 0,
            "BROKER_POOL_MAX_PER_ADDRESS must be positive"
        );
        Ok(())
    }
}
