//! Raw info record: the flat key/value snapshot a device reports about itself.
//!
//! The record is replaced wholesale on every negotiation or update, never
//! partially merged. Accessors check for field *presence*: many legitimate
//! values are falsy (`device_on: false`, `on_time: 0`).

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::{DeviceId, HardwareId};

/// Geographic location reported by a device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// Hardware summary assembled from the info record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HardwareInfo {
    pub sw_ver: Option<String>,
    pub hw_ver: Option<String>,
    pub mac: Option<String>,
    #[serde(rename = "type")]
    pub type_tag: Option<String>,
    #[serde(rename = "hwId")]
    pub hw_id: Option<String>,
    pub dev_name: Option<String>,
    #[serde(rename = "oemId")]
    pub oem_id: Option<String>,
}

/// Flat key/value record reported by `get_device_info` (or by the parent's
/// child list for children).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceInfo(Map<String, Value>);

impl DeviceInfo {
    /// Wrap a JSON payload; anything but an object yields an empty record.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    /// Whether the field is present, whatever its value.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Raw field value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String field value.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Integer field value.
    #[must_use]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record has no fields (e.g. before the first negotiation).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the underlying JSON object.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Identifier the device reports for itself.
    #[must_use]
    pub fn device_id(&self) -> Option<DeviceId> {
        self.get_str("device_id").and_then(|s| DeviceId::new(s).ok())
    }

    /// Hardware identifier.
    #[must_use]
    pub fn hardware_id(&self) -> Option<HardwareId> {
        self.get_str("hw_id").and_then(|s| HardwareId::new(s).ok())
    }

    /// Device-type tag (e.g. `SMART.TAPOPLUG`).
    #[must_use]
    pub fn type_tag(&self) -> Option<&str> {
        self.get_str("type")
    }

    /// Model name.
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.get_str("model")
    }

    /// Whether the relay/light is on. Missing means off.
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.get("device_on").and_then(Value::as_bool).unwrap_or(false)
    }

    /// Seconds the device has been on, if reported.
    ///
    /// Fractional values are rounded; non-finite or out-of-range ones are
    /// treated as not reported.
    #[must_use]
    pub fn on_time(&self) -> Option<i64> {
        self.get("on_time")
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().and_then(round_to_i64)))
    }

    /// User-assigned name, base64-decoded from `nickname`.
    #[must_use]
    pub fn alias(&self) -> Option<String> {
        self.get_str("nickname")
            .filter(|s| !s.is_empty())
            .and_then(decode_base64)
    }

    /// Connected network name, base64-decoded from `ssid`.
    #[must_use]
    pub fn ssid(&self) -> Option<String> {
        self.get_str("ssid")
            .filter(|s| !s.is_empty())
            .and_then(decode_base64)
    }

    /// MAC address with colon separators.
    #[must_use]
    pub fn mac(&self) -> Option<String> {
        self.get_str("mac").map(|mac| mac.replace('-', ":"))
    }

    /// Location, scaled from the device's 1/10 000 degree units.
    ///
    /// Missing coordinates read as zero.
    #[must_use]
    pub fn location(&self) -> Location {
        let scaled = |key: &str| self.get(key).and_then(Value::as_f64).unwrap_or(0.0) / 10_000.0;
        Location {
            latitude: scaled("latitude"),
            longitude: scaled("longitude"),
        }
    }

    /// Received signal strength in dBm; zero is reported as unknown.
    #[must_use]
    pub fn rssi(&self) -> Option<i64> {
        self.get_i64("rssi").filter(|rssi| *rssi != 0)
    }

    /// Signal level bucket (0–3).
    #[must_use]
    pub fn signal_level(&self) -> Option<i64> {
        self.get_i64("signal_level")
    }

    /// Whether the device reports overheating.
    #[must_use]
    pub fn overheated(&self) -> Option<bool> {
        self.get("overheated").and_then(Value::as_bool)
    }

    /// Hardware summary.
    #[must_use]
    pub fn hardware_info(&self) -> HardwareInfo {
        let owned = |key: &str| self.get_str(key).map(str::to_owned);
        HardwareInfo {
            sw_ver: owned("fw_ver"),
            hw_ver: owned("hw_ver"),
            mac: owned("mac"),
            type_tag: owned("type"),
            hw_id: owned("device_id"),
            dev_name: self.alias(),
            oem_id: owned("oem_id"),
        }
    }
}

impl From<Map<String, Value>> for DeviceInfo {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Decode a base64 string sent by a device; `None` if it is not valid UTF-8.
#[must_use]
pub fn decode_base64(encoded: &str) -> Option<String> {
    let bytes = STANDARD.decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}

/// Base64-encode a string the way devices expect for names and secrets.
#[must_use]
pub fn encode_base64(plain: &str) -> String {
    STANDARD.encode(plain.as_bytes())
}

/// Round to the nearest integer, or `None` outside the `i64` range.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn round_to_i64(value: f64) -> Option<i64> {
    let rounded = value.round();
    // Rounds up to 2^63, the first value out of range.
    let limit = i64::MAX as f64;
    (rounded.is_finite() && rounded >= -limit && rounded < limit).then_some(rounded as i64)
}
