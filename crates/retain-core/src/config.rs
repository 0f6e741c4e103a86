//! Engine configuration
//!
//! Values come from `RETAIN_*` environment variables layered over the
//! defaults. Anything that is set but unparsable is an error.

use crate::fsrs::FSRSParameters;
use crate::leech::LeechPolicy;

/// Retention target, in (0, 1)
pub const ENV_REQUEST_RETENTION: &str = "RETAIN_REQUEST_RETENTION";
/// Longest interval in days
pub const ENV_MAXIMUM_INTERVAL: &str = "RETAIN_MAXIMUM_INTERVAL";
/// 17 comma-separated weights
pub const ENV_WEIGHTS: &str = "RETAIN_WEIGHTS";
/// Optimistic commit attempts before giving up
pub const ENV_MAX_COMMIT_ATTEMPTS: &str = "RETAIN_MAX_COMMIT_ATTEMPTS";

/// Default number of attempts for an optimistic commit
pub const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 3;

/// Configuration error
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
    #[error("Invalid scheduler parameters: {0}")]
    Parameters(String),
}

/// Everything the review orchestrator needs besides its store
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub parameters: FSRSParameters,
    pub leech: LeechPolicy,
    /// At least 1
    pub max_commit_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parameters: FSRSParameters::default(),
            leech: LeechPolicy::default(),
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
        }
    }
}

impl EngineConfig {
    /// Read overrides from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_REQUEST_RETENTION) {
            config.parameters.request_retention = parse_value(ENV_REQUEST_RETENTION, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAXIMUM_INTERVAL) {
            config.parameters.maximum_interval = parse_value(ENV_MAXIMUM_INTERVAL, &raw)?;
        }
        if let Some(raw) = lookup(ENV_WEIGHTS) {
            config.parameters.w = parse_weights(&raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_COMMIT_ATTEMPTS) {
            config.max_commit_attempts = parse_value(ENV_MAX_COMMIT_ATTEMPTS, &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parameters.validate().map_err(ConfigError::Parameters)?;
        if self.max_commit_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: ENV_MAX_COMMIT_ATTEMPTS.to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

fn parse_weights(raw: &str) -> Result<[f64; 17], ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: ENV_WEIGHTS.to_string(),
        value: raw.to_string(),
    };

    let values = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;

    <[f64; 17]>::try_from(values).map_err(|_| invalid())
}
