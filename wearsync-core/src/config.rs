//! Tunables for the channel, the layout fitter, and the producer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::TemperatureUnit;

/// Upper bound on `measure` calls per fit.
pub const MAX_FIT_ITERATIONS: u32 = 6;

/// What the channel does when a connect attempt fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryMode {
    /// Report the first failure to the caller
    #[default]
    SurfaceOnce,
    /// Reconnect automatically until `max_attempts` is reached
    AutoRetry,
}

impl fmt::Display for RetryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryMode::SurfaceOnce => write!(f, "surface-once"),
            RetryMode::AutoRetry => write!(f, "auto-retry"),
        }
    }
}

impl FromStr for RetryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "surface-once" => Ok(RetryMode::SurfaceOnce),
            "auto-retry" => Ok(RetryMode::AutoRetry),
            _ => Err(format!(
                "Invalid retry mode '{}'. Valid options: surface-once, auto-retry",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub mode: RetryMode,
    /// Total connect attempts, the first one included
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            mode: RetryMode::SurfaceOnce,
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    pub fn surface_once() -> Self {
        Self::default()
    }

    pub fn auto_retry(max_attempts: u32) -> Self {
        Self {
            mode: RetryMode::AutoRetry,
            max_attempts,
        }
    }

    /// Whether another attempt may follow `failed_attempts` failures.
    pub fn allows_retry(&self, failed_attempts: u32) -> bool {
        match self.mode {
            RetryMode::SurfaceOnce => false,
            RetryMode::AutoRetry => failed_attempts < self.max_attempts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Smallest text scale the fitter will return
    pub min_scale: f32,
    pub max_iterations: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            min_scale: 6.0,
            max_iterations: MAX_FIT_ITERATIONS,
        }
    }
}

/// Everything the core reads from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub retry_policy: RetryPolicy,
    pub layout: LayoutConfig,
    pub units: TemperatureUnit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_once_never_retries() {
        let policy = RetryPolicy::surface_once();
        assert!(!policy.allows_retry(0));
        assert!(!policy.allows_retry(1));
    }

    #[test]
    fn test_auto_retry_budget() {
        let policy = RetryPolicy::auto_retry(3);
        assert!(policy.allows_retry(1));
        assert!(policy.allows_retry(2));
        assert!(!policy.allows_retry(3));
    }

    #[test]
    fn test_retry_mode_from_str() {
        assert_eq!(
            RetryMode::from_str("auto-retry").unwrap(),
            RetryMode::AutoRetry
        );
        assert_eq!(
            RetryMode::from_str("Surface-Once").unwrap(),
            RetryMode::SurfaceOnce
        );
        assert!(RetryMode::from_str("forever").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.retry_policy.mode, RetryMode::SurfaceOnce);
        assert_eq!(config.layout.max_iterations, MAX_FIT_ITERATIONS);
        assert_eq!(config.units, TemperatureUnit::Metric);
    }

    #[test]
    fn test_retry_policy_json() {
        let json = r#"{"mode":"auto-retry","max_attempts":5}"#;
        let policy: RetryPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy, RetryPolicy::auto_retry(5));

        let partial: RetryPolicy = serde_json::from_str(r#"{"mode":"auto-retry"}"#).unwrap();
        assert_eq!(partial.max_attempts, 3);
    }
}
