//! Wireless networks seen by a device during a scan.

use serde::{Deserialize, Serialize};

/// Default key type used when joining a network.
pub const DEFAULT_KEY_TYPE: &str = "wpa2_psk";

/// A wireless network reported by `get_wireless_scan_info`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WifiNetwork {
    /// Network name (decoded).
    pub ssid: String,
    /// Cipher identifier as reported by the device.
    pub cipher_type: i64,
    /// Key management type (e.g. `wpa2_psk`).
    pub key_type: String,
    /// Radio channel.
    pub channel: i64,
    /// Signal level bucket.
    pub signal_level: i64,
    /// Access point hardware address.
    pub bssid: String,
}
