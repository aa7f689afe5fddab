//! Per-run worker configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration a worker receives for one run of a test file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Opaque key identifying the run environment (project, browser,
    /// platform). It is baked into every assigned test id, so structurally
    /// identical files run under different configurations get disjoint ids.
    pub configuration_key: String,

    /// Ambient timeout applied to tests that carry no explicit override.
    pub default_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            configuration_key: "default".to_string(),
            default_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    pub fn new(configuration_key: impl Into<String>) -> Self {
        Self {
            configuration_key: configuration_key.into(),
            ..Self::default()
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.configuration_key.is_empty() {
            return Err("Configuration key cannot be empty".to_string());
        }

        if self.default_timeout.is_zero() {
            return Err("Default timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}
