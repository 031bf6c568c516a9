//! Device category and the classifier that derives it.
//!
//! The category is derived exclusively from negotiated capability ids and the
//! device-type tag reported in the info record, never from which modules ended
//! up loaded.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::capability::{CHILD_DEVICE, CapabilitySet};

/// User-facing category of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCategory {
    Plug,
    Strip,
    Bulb,
    LightStrip,
    Dimmer,
    WallSwitch,
    Sensor,
    Hub,
    Thermostat,
}

impl fmt::Display for DeviceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Plug => "plug",
            Self::Strip => "strip",
            Self::Bulb => "bulb",
            Self::LightStrip => "light_strip",
            Self::Dimmer => "dimmer",
            Self::WallSwitch => "wall_switch",
            Self::Sensor => "sensor",
            Self::Hub => "hub",
            Self::Thermostat => "thermostat",
        };
        f.write_str(s)
    }
}

/// Result of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// One of the classification rules matched.
    Matched(DeviceCategory),
    /// Nothing matched; the category is a fallback guess.
    Fallback(DeviceCategory),
}

impl Classification {
    /// The resulting category, regardless of how it was reached.
    #[must_use]
    pub fn category(self) -> DeviceCategory {
        match self {
            Self::Matched(category) | Self::Fallback(category) => category,
        }
    }

    /// Whether no rule matched.
    #[must_use]
    pub fn is_ambiguous(self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Map negotiated capabilities and the device-type tag to a category.
///
/// Rules are checked in order, first match wins.
#[must_use]
pub fn classify(capabilities: &CapabilitySet, type_tag: &str) -> Classification {
    use DeviceCategory as C;

    let has = |id: &str| capabilities.contains(id);

    let category = if type_tag.contains("HUB") {
        C::Hub
    } else if type_tag.contains("PLUG") {
        if has(CHILD_DEVICE) { C::Strip } else { C::Plug }
    } else if has("light_strip") {
        C::LightStrip
    } else if type_tag.contains("SWITCH") && has(CHILD_DEVICE) {
        C::WallSwitch
    } else if has("dimmer_calibration") {
        C::Dimmer
    } else if has("brightness") {
        C::Bulb
    } else if type_tag.contains("SWITCH") {
        C::WallSwitch
    } else if type_tag.contains("SENSOR") {
        C::Sensor
    } else if type_tag.contains("ENERGY") {
        C::Thermostat
    } else {
        return Classification::Fallback(C::Plug);
    };

    Classification::Matched(category)
}
