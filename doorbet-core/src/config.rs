use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub db_file: String,
    pub retry: RetryPolicy,
    pub default_odds: OddsConfig,
    pub settle_poll_attempts: u32,
    pub settle_poll_interval: Duration,
}

/// How the store retries write conflicts before giving up.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OddsConfig {
    pub salad: f64,
    pub pizza: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(20),
        }
    }
}

impl RetryPolicy {
    /// Linear backoff: attempt 1 waits `base_delay`, attempt 2 twice that, ...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for OddsConfig {
    fn default() -> Self {
        Self {
            salad: 0.05,
            pizza: 0.05,
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            db_file: "doorbet.db".to_string(),
            retry: RetryPolicy::default(),
            default_odds: OddsConfig::default(),
            settle_poll_attempts: 50,
            settle_poll_interval: Duration::from_millis(100),
        }
    }
}

impl GameConfig {
    /// Load `path` if it exists, otherwise fall back to defaults.
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path).await? {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: GameConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.db_file.trim().is_empty() {
            return Err(StoreError::config("Database file name cannot be empty"));
        }

        if self.retry.max_attempts == 0 {
            return Err(StoreError::config("Retry attempts must be greater than 0"));
        }

        let odds = self.default_odds;
        let in_range = |p: f64| p.is_finite() && (0.0..=1.0).contains(&p);
        if !in_range(odds.salad) || !in_range(odds.pizza) || odds.salad + odds.pizza > 1.0 {
            return Err(StoreError::config(
                "Default odds must be probabilities summing to at most 1",
            ));
        }

        if self.settle_poll_attempts == 0 {
            return Err(StoreError::config(
                "Settlement poll attempts must be greater than 0",
            ));
        }

        Ok(())
    }
}
