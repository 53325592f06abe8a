//! Ledger configuration.
//!
//! Every field has a default matching the game client's constants, so an empty
//! TOML file (or no file at all) yields the stock economy.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ledger::{Amount, DEFAULT_EVENT_LOG_LIMIT};

/// What `stake` does when the account already has an active stake.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RestakePolicy {
    /// Overwrite the active stake. The replaced principal is forfeited.
    #[default]
    Replace,
    /// Refuse the new stake and leave state untouched.
    Reject,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LedgerConfig {
    pub starting_balance: Amount,
    pub initial_health: u32,
    pub checkin_base_reward: Amount,
    /// Streak bonus per consecutive check-in, in tenths of the base reward.
    pub streak_bonus_tenths: u64,
    pub enforce_streak_reset: bool,
    pub xp_per_artifact: u64,
    pub restake_policy: RestakePolicy,
    pub rng_seed: Option<u64>,
    pub base_price_usd: f64,
    /// Symmetric price jitter as a fraction (0.05 = ±5%).
    pub price_jitter: f64,
    pub price_history_limit: usize,
    /// Ledger events kept in memory; 0 disables the log.
    pub event_log_limit: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_balance: 1_000_000,
            initial_health: 100,
            checkin_base_reward: 50_000,
            streak_bonus_tenths: 1,
            enforce_streak_reset: true,
            xp_per_artifact: 100,
            restake_policy: RestakePolicy::Replace,
            rng_seed: None,
            base_price_usd: 0.00012,
            price_jitter: 0.05,
            price_history_limit: 256,
            event_log_limit: DEFAULT_EVENT_LOG_LIMIT,
        }
    }
}

impl LedgerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: LedgerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.price_jitter) {
            return Err(ConfigError::Invalid("price_jitter must be in [0, 1)"));
        }
        if !(self.base_price_usd.is_finite() && self.base_price_usd > 0.0) {
            return Err(ConfigError::Invalid("base_price_usd must be positive"));
        }
        Ok(())
    }
}
