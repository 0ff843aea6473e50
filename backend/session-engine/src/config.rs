use serde::Deserialize;
use std::env;

use crate::utils::retry::RetryPolicy;

const DEFAULT_PASS_PERCENTAGE: f64 = 0.5;
const DEFAULT_WEIGHTAGE: f64 = 1.0;
const DEFAULT_WRONG_REDUCTION: f64 = 0.5;
const DEFAULT_MAILBOX_CAPACITY: usize = 64;
const DEFAULT_STORE_RETRY_ATTEMPTS: usize = 5;
const DEFAULT_STORE_RETRY_BACKOFF_MS: u64 = 20;

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Fraction of the module's total mark required to pass an evaluation.
    pub pass_percentage: f64,
    /// Weightage assumed for moments whose authoring defaults omit one.
    pub default_weightage: f64,
    /// Penalty per wrong event when the authoring defaults omit one.
    pub default_wrong_reduction: f64,
    /// Bound on each session actor's command mailbox.
    pub mailbox_capacity: usize,
    pub store_retry_attempts: usize,
    pub store_retry_backoff_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pass_percentage: DEFAULT_PASS_PERCENTAGE,
            default_weightage: DEFAULT_WEIGHTAGE,
            default_wrong_reduction: DEFAULT_WRONG_REDUCTION,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            store_retry_attempts: DEFAULT_STORE_RETRY_ATTEMPTS,
            store_retry_backoff_ms: DEFAULT_STORE_RETRY_BACKOFF_MS,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `config/{APP_ENV}.toml` plus `APP__`-prefixed
    /// environment overrides, falling back to built-in defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let pass_percentage = settings
            .get_float("scoring.pass_percentage")
            .unwrap_or(DEFAULT_PASS_PERCENTAGE);
        let default_weightage = settings
            .get_float("scoring.default_weightage")
            .unwrap_or(DEFAULT_WEIGHTAGE);
        let default_wrong_reduction = settings
            .get_float("scoring.default_wrong_reduction")
            .unwrap_or(DEFAULT_WRONG_REDUCTION);
        let mailbox_capacity = settings
            .get_int("engine.mailbox_capacity")
            .map(|v| v.max(1) as usize)
            .unwrap_or(DEFAULT_MAILBOX_CAPACITY);
        let store_retry_attempts = settings
            .get_int("engine.store_retry_attempts")
            .map(|v| v.max(1) as usize)
            .unwrap_or(DEFAULT_STORE_RETRY_ATTEMPTS);
        let store_retry_backoff_ms = settings
            .get_int("engine.store_retry_backoff_ms")
            .map(|v| v.max(0) as u64)
            .unwrap_or(DEFAULT_STORE_RETRY_BACKOFF_MS);

        Ok(Self {
            pass_percentage,
            default_weightage,
            default_wrong_reduction,
            mailbox_capacity,
            store_retry_attempts,
            store_retry_backoff_ms,
        })
    }

    pub fn store_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.store_retry_attempts, self.store_retry_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn load_uses_defaults_without_overrides() {
        std::env::remove_var("APP__SCORING__PASS_PERCENTAGE");
        let config = EngineConfig::load().expect("config should load");
        assert_eq!(config.pass_percentage, DEFAULT_PASS_PERCENTAGE);
        assert_eq!(config.default_weightage, DEFAULT_WEIGHTAGE);
        assert_eq!(config.mailbox_capacity, DEFAULT_MAILBOX_CAPACITY);
    }

    #[test]
    #[serial]
    fn load_honours_env_overrides() {
        std::env::set_var("APP__SCORING__PASS_PERCENTAGE", "0.8");
        let config = EngineConfig::load().expect("config should load");
        assert_eq!(config.pass_percentage, 0.8);
        std::env::remove_var("APP__SCORING__PASS_PERCENTAGE");
    }
}
