use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use wearsync_core::{CoreConfig, LayoutConfig, RetryMode, RetryPolicy, TemperatureUnit};

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Host configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// What the channel does when a connect fails
    pub retry_mode: ConfigValue<RetryMode>,
    /// Connect attempts before a failure is surfaced (auto-retry only)
    pub max_attempts: ConfigValue<u32>,
    /// Unit the producer formats temperatures in
    pub units: ConfigValue<TemperatureUnit>,
    /// Layout fitter settings (file only)
    pub layout: LayoutConfig,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    retry_policy: Option<RetryPolicyFile>,
    units: Option<TemperatureUnit>,
    layout: Option<LayoutConfig>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RetryPolicyFile {
    mode: Option<RetryMode>,
    max_attempts: Option<u32>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::load_with_env(config_path, |key| std::env::var(key).ok())
    }

    /// Same as [`Config::load`], reading variables through `env`.
    pub fn load_with_env<F>(config_path: Option<PathBuf>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = RetryPolicy::default();

        // Start with defaults
        let mut retry_mode = ConfigValue::new(defaults.mode, ConfigSource::Default);
        let mut max_attempts = ConfigValue::new(defaults.max_attempts, ConfigSource::Default);
        let mut units = ConfigValue::new(TemperatureUnit::default(), ConfigSource::Default);
        let mut layout = LayoutConfig::default();
        let mut config_file = None;

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(policy) = file_config.retry_policy {
                if let Some(mode) = policy.mode {
                    retry_mode = ConfigValue::new(mode, ConfigSource::File);
                }
                if let Some(attempts) = policy.max_attempts {
                    max_attempts = ConfigValue::new(attempts, ConfigSource::File);
                }
            }
            if let Some(unit) = file_config.units {
                units = ConfigValue::new(unit, ConfigSource::File);
            }
            if let Some(layout_config) = file_config.layout {
                layout = layout_config;
            }
        }

        // Apply environment variable overrides
        if let Some(mode) = env("WEARSYNC_RETRY_MODE") {
            let mode = mode
                .parse::<RetryMode>()
                .map_err(|e| ConfigError::InvalidEnv("WEARSYNC_RETRY_MODE", e))?;
            retry_mode = ConfigValue::new(mode, ConfigSource::Environment);
        }
        if let Some(attempts) = env("WEARSYNC_MAX_ATTEMPTS") {
            let attempts = attempts.parse::<u32>().map_err(|_| {
                ConfigError::InvalidEnv(
                    "WEARSYNC_MAX_ATTEMPTS",
                    format!("'{}' is not a valid attempt count", attempts),
                )
            })?;
            max_attempts = ConfigValue::new(attempts, ConfigSource::Environment);
        }
        if let Some(unit) = env("WEARSYNC_UNITS") {
            let unit = unit
                .parse::<TemperatureUnit>()
                .map_err(|e| ConfigError::InvalidEnv("WEARSYNC_UNITS", e))?;
            units = ConfigValue::new(unit, ConfigSource::Environment);
        }

        Ok(Self {
            retry_mode,
            max_attempts,
            units,
            layout,
            config_file,
        })
    }

    /// Settings handed to the core library
    pub fn to_core(&self) -> CoreConfig {
        CoreConfig {
            retry_policy: RetryPolicy {
                mode: self.retry_mode.value,
                max_attempts: self.max_attempts.value,
            },
            layout: self.layout,
            units: self.units.value,
        }
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/wearsync/
    /// - macOS: ~/Library/Application Support/wearsync/
    /// - Windows: %APPDATA%/wearsync/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wearsync")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidEnv(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidEnv(var, message) => {
                write!(f, "Invalid value for {}: {}", var, message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::tempdir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_default_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load_with_env(Some(config_path), no_env).unwrap();
        assert_eq!(config.retry_mode.value, RetryMode::SurfaceOnce);
        assert_eq!(config.retry_mode.source, ConfigSource::Default);
        assert_eq!(config.max_attempts.value, 3);
        assert_eq!(config.units.value, TemperatureUnit::Metric);
        assert_eq!(config.layout, LayoutConfig::default());
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "retry_policy:").unwrap();
        writeln!(file, "  mode: auto-retry").unwrap();
        writeln!(file, "  max_attempts: 5").unwrap();
        writeln!(file, "units: imperial").unwrap();
        writeln!(file, "layout:").unwrap();
        writeln!(file, "  min_scale: 8.0").unwrap();

        let config = Config::load_with_env(Some(config_path.clone()), no_env).unwrap();
        assert_eq!(config.retry_mode.value, RetryMode::AutoRetry);
        assert_eq!(config.retry_mode.source, ConfigSource::File);
        assert_eq!(config.max_attempts.value, 5);
        assert_eq!(config.units.value, TemperatureUnit::Imperial);
        assert_eq!(config.layout.min_scale, 8.0);
        assert_eq!(config.layout.max_iterations, 6);
        assert_eq!(config.config_file, Some(config_path));
    }

    #[test]
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "units: imperial").unwrap();

        let env: HashMap<&str, &str> = [
            ("WEARSYNC_UNITS", "metric"),
            ("WEARSYNC_RETRY_MODE", "auto-retry"),
            ("WEARSYNC_MAX_ATTEMPTS", "4"),
        ]
        .into_iter()
        .collect();

        let config =
            Config::load_with_env(Some(config_path), |k| env.get(k).map(|v| v.to_string()))
                .unwrap();
        assert_eq!(config.units.value, TemperatureUnit::Metric);
        assert_eq!(config.units.source, ConfigSource::Environment);
        assert_eq!(config.retry_mode.value, RetryMode::AutoRetry);
        assert_eq!(config.max_attempts.value, 4);
        assert_eq!(config.max_attempts.source, ConfigSource::Environment);
    }

    #[test]
    fn test_invalid_env_value() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let result = Config::load_with_env(Some(config_path), |k| {
            (k == "WEARSYNC_MAX_ATTEMPTS").then(|| "many".to_string())
        });
        let err = result.unwrap_err();
        assert!(err.to_string().contains("WEARSYNC_MAX_ATTEMPTS"));
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let result = Config::load_with_env(Some(config_path), no_env);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_to_core() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "retry_policy:").unwrap();
        writeln!(file, "  mode: auto-retry").unwrap();

        let core = Config::load_with_env(Some(config_path), no_env)
            .unwrap()
            .to_core();
        assert_eq!(core.retry_policy, RetryPolicy::auto_retry(3));
        assert_eq!(core.units, TemperatureUnit::Metric);
    }
}
