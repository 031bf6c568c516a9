//! Connection settings for one device.

use std::time::Duration;

use serde::Deserialize;

use smartlink_domain::credentials::Credentials;

/// Default per-request timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
/// Default pairing session length, in seconds.
pub const DEFAULT_PAIRING_TIMEOUT_SECS: u64 = 10;

/// How to reach and authenticate against a device.
///
/// Children share the configuration of their parent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Hostname or IP address.
    pub host: String,
    /// Port override; the transport picks its own default when unset.
    pub port: Option<u16>,
    /// Username/password pair.
    pub credentials: Option<Credentials>,
    /// Pre-computed credential hash, used instead of `credentials`.
    pub credentials_hash: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Default pairing session length in seconds.
    pub pairing_timeout_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: None,
            credentials: None,
            credentials_hash: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            pairing_timeout_secs: DEFAULT_PAIRING_TIMEOUT_SECS,
        }
    }
}

impl DeviceConfig {
    /// Configuration for a host with default timeouts and no credentials.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    #[must_use]
    pub fn with_credentials_hash(mut self, hash: impl Into<String>) -> Self {
        self.credentials_hash = Some(hash.into());
        self
    }

    /// Whether any form of credentials is configured.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some() || self.credentials_hash.is_some()
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn pairing_timeout(&self) -> Duration {
        Duration::from_secs(self.pairing_timeout_secs)
    }
}
