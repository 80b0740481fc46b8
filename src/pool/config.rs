//! Pool configuration

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::{PoolError, Result};

/// Environment variable overriding the default concurrency
pub const CONCURRENCY_ENV: &str = "GOBS_CONCURRENCY";

/// Environment variable overriding the default pool name
pub const POOL_NAME_ENV: &str = "GOBS_POOL_NAME";

/// Pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Name used in log fields
    pub name: String,
    /// Maximum number of jobs running at the same time
    pub concurrency: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "gobs".to_string(),
            concurrency: num_cpus::get(),
        }
    }
}

impl PoolConfig {
    /// Create a configuration with the given concurrency
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency,
            ..Default::default()
        }
    }

    /// Build a configuration from `GOBS_CONCURRENCY` and `GOBS_POOL_NAME`,
    /// falling back to defaults for unset variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(name) = std::env::var(POOL_NAME_ENV) {
            config.name = name;
        }

        if let Ok(raw) = std::env::var(CONCURRENCY_ENV) {
            config.concurrency = raw
                .trim()
                .parse()
                .map_err(|e| PoolError::Config(format!("{}={:?}: {}", CONCURRENCY_ENV, raw, e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the pool name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the concurrency limit
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Check the configuration can back a pool
    pub fn validate(&self) -> Result<()> {
        if self.concurrency < 1 {
            return Err(PoolError::InvalidConcurrency(self.concurrency));
        }
        if self.concurrency > Semaphore::MAX_PERMITS {
            return Err(PoolError::ConcurrencyTooLarge(self.concurrency));
        }
        Ok(())
    }
}
