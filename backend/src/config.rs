use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::registry::DEFAULT_LIVENESS_TIMEOUT;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds after the last heartbeat at which a peer stops being listed
    #[serde(default = "default_liveness_timeout_secs")]
    pub liveness_timeout_secs: u64,

    /// Seconds between background purges of expired records
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_port() -> u16 {
    8000
}

fn default_liveness_timeout_secs() -> u64 {
    DEFAULT_LIVENESS_TIMEOUT.as_secs()
}

fn default_sweep_interval_secs() -> u64 {
    // Half the liveness window keeps memory bounded without busy sweeping
    default_liveness_timeout_secs() / 2
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?;

        let settings: Config = config.try_deserialize().unwrap_or_else(|e| {
            tracing::warn!("Invalid configuration in environment ({}), using defaults", e);
            Config::default()
        });

        Ok(settings)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_secs(self.liveness_timeout_secs.max(1))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            liveness_timeout_secs: default_liveness_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.liveness_timeout(), Duration::from_secs(60));
        assert_eq!(config.sweep_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_zero_durations_are_clamped() {
        let config = Config {
            port: 8000,
            liveness_timeout_secs: 0,
            sweep_interval_secs: 0,
        };
        assert_eq!(config.liveness_timeout(), Duration::from_secs(1));
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"liveness_timeout_secs": 90}"#).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.liveness_timeout_secs, 90);
        assert_eq!(config.sweep_interval_secs, 30);
    }
}
