//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `smartlink.toml` in the working directory unless another path
//! is given. Every field has a default so the file is optional. Environment
//! variables take precedence over file values; command-line flags are applied
//! last, by the caller.

use std::path::Path;

use serde::Deserialize;

use smartlink_adapter_virtual::DeviceKind;
use smartlink_app::DeviceConfig;
use smartlink_app::config::{DEFAULT_PAIRING_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS};
use smartlink_domain::credentials::Credentials;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How to reach the device.
    pub device: DeviceSettings,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Which device to simulate.
    pub simulation: SimulationConfig,
}

/// Connection settings of the controlled device.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Hostname or IP address.
    pub host: String,
    /// Port override.
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Pre-computed credential hash, used instead of username/password.
    pub credentials_hash: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Default pairing session length in seconds.
    pub pairing_timeout_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Simulated device selection.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub device: SimulatedDevice,
}

/// Device kinds the front end can simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SimulatedDevice {
    #[default]
    Plug,
    Strip,
    Hub,
    Bulb,
}

impl From<SimulatedDevice> for DeviceKind {
    fn from(device: SimulatedDevice) -> Self {
        match device {
            SimulatedDevice::Plug => Self::Plug,
            SimulatedDevice::Strip => Self::Strip,
            SimulatedDevice::Hub => Self::Hub,
            SimulatedDevice::Bulb => Self::Bulb,
        }
    }
}

impl Config {
    /// Load configuration from `path` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("SMARTLINK_HOST") {
            self.device.host = val;
        }
        if let Some(val) = var("SMARTLINK_USERNAME") {
            self.device.username = Some(val);
        }
        if let Some(val) = var("SMARTLINK_PASSWORD") {
            self.device.password = Some(val);
        }
        if let Some(val) = var("SMARTLINK_CREDENTIALS_HASH") {
            self.device.credentials_hash = Some(val);
        }
        if let Some(secs) = var("SMARTLINK_TIMEOUT").and_then(|val| val.parse().ok()) {
            self.device.timeout_secs = secs;
        }
        if let Some(val) = var("SMARTLINK_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    /// Check the merged configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for an empty host, a zero timeout,
    /// or a username without a password (and vice versa).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.host.trim().is_empty() {
            return Err(ConfigError::Validation("host must not be empty".to_string()));
        }
        if self.device.timeout_secs == 0 {
            return Err(ConfigError::Validation("timeout must be non-zero".to_string()));
        }
        if self.device.username.is_some() != self.device.password.is_some() {
            return Err(ConfigError::Validation(
                "authentication requires both username and password".to_string(),
            ));
        }
        Ok(())
    }

    /// Session configuration for the controlled device.
    #[must_use]
    pub fn device_config(&self) -> DeviceConfig {
        let settings = &self.device;
        let credentials = settings
            .username
            .as_ref()
            .zip(settings.password.as_ref())
            .map(|(username, password)| Credentials::new(username.as_str(), password.as_str()));
        DeviceConfig {
            host: settings.host.clone(),
            port: settings.port,
            credentials,
            credentials_hash: settings.credentials_hash.clone(),
            timeout_secs: settings.timeout_secs,
            pairing_timeout_secs: settings.pairing_timeout_secs,
        }
    }
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: None,
            username: None,
            password: None,
            credentials_hash: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            pairing_timeout_secs: DEFAULT_PAIRING_TIMEOUT_SECS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "warn,smartctl=info,smartlink_app=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.device.host, "127.0.0.1");
        assert_eq!(config.device.timeout_secs, 5);
        assert_eq!(config.device.pairing_timeout_secs, 10);
        assert_eq!(config.simulation.device, SimulatedDevice::Plug);
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.device.timeout_secs, 5);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [device]
            host = '192.168.1.20'
            port = 9999
            username = 'user@example.com'
            password = 'secret'
            timeout_secs = 8
            pairing_timeout_secs = 30

            [logging]
            filter = 'debug'

            [simulation]
            device = 'hub'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.device.host, "192.168.1.20");
        assert_eq!(config.device.port, Some(9999));
        assert_eq!(config.device.timeout_secs, 8);
        assert_eq!(config.device.pairing_timeout_secs, 30);
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.simulation.device, SimulatedDevice::Hub);
    }

    #[test]
    fn should_parse_partial_toml_with_defaults() {
        let toml = "
            [device]
            host = '10.0.0.2'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.device.host, "10.0.0.2");
        assert_eq!(config.device.timeout_secs, 5);
        assert_eq!(config.simulation.device, SimulatedDevice::Plug);
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file(Path::new("nonexistent.toml")).unwrap();
        assert_eq!(config.device.host, "127.0.0.1");
    }

    #[test]
    fn should_let_environment_override_file_values() {
        let mut config: Config = toml::from_str("[device]\nhost = 'file-host'\ntimeout_secs = 3").unwrap();

        config.apply_env_overrides(env(&[
            ("SMARTLINK_HOST", "env-host"),
            ("SMARTLINK_TIMEOUT", "9"),
            ("SMARTLINK_LOG", "trace"),
        ]));

        assert_eq!(config.device.host, "env-host");
        assert_eq!(config.device.timeout_secs, 9);
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn should_prefer_rust_log_over_smartlink_log() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[("SMARTLINK_LOG", "info"), ("RUST_LOG", "debug")]));
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn should_ignore_unparsable_timeout_override() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[("SMARTLINK_TIMEOUT", "soon")]));
        assert_eq!(config.device.timeout_secs, 5);
    }

    #[test]
    fn should_reject_username_without_password() {
        let mut config = Config::default();
        config.device.username = Some("user".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_zero_timeout() {
        let mut config = Config::default();
        config.device.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_accept_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn should_build_device_config_with_credentials() {
        let mut config = Config::default();
        config.device.username = Some("user".to_string());
        config.device.password = Some("pw".to_string());

        let device = config.device_config();

        assert!(device.has_credentials());
        assert_eq!(device.host, "127.0.0.1");
        assert_eq!(device.credentials.map(|c| c.username), Some("user".to_string()));
    }

    #[test]
    fn should_build_device_config_without_credentials() {
        let device = Config::default().device_config();
        assert!(!device.has_credentials());
    }
}
