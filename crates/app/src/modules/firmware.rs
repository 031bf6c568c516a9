//! Firmware update availability module.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use smartlink_domain::feature::{FeatureType, FeatureValue};
use smartlink_domain::message::Request;

use super::{Module, ModuleContext, ModuleError, ModuleKind};
use crate::features::{Container, Feature};

/// Latest firmware as advertised by the vendor cloud.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestFirmware {
    /// Whether the installed firmware is older than the latest one.
    #[serde(default)]
    pub need_to_upgrade: bool,
    /// Latest version string.
    #[serde(default)]
    pub fw_ver: String,
    /// Release notes, when provided.
    #[serde(default)]
    pub release_note: Option<String>,
}

/// Checks for firmware updates. Polled at most once a day.
#[derive(Debug, Clone, Default)]
pub struct Firmware {
    current: Option<String>,
    latest: Option<LatestFirmware>,
}

impl Firmware {
    /// Installed firmware version.
    #[must_use]
    pub fn current_version(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Latest firmware information.
    #[must_use]
    pub fn latest(&self) -> Option<&LatestFirmware> {
        self.latest.as_ref()
    }

    /// Whether a newer firmware is available.
    #[must_use]
    pub fn update_available(&self) -> bool {
        self.latest.as_ref().is_some_and(|l| l.need_to_upgrade)
    }
}

impl Module for Firmware {
    fn query(&self) -> Request {
        Request::single("get_latest_fw", None)
    }

    fn minimum_update_interval(&self) -> TimeDelta {
        TimeDelta::hours(24)
    }

    fn post_update(&mut self, ctx: &ModuleContext<'_>) -> Result<(), ModuleError> {
        self.latest = Some(ctx.parse("get_latest_fw")?);
        self.current = ctx.info.get_str("fw_ver").map(str::to_owned);
        Ok(())
    }

    fn features(&self) -> Vec<Feature> {
        let container = Container::Module(ModuleKind::Firmware);
        vec![
            Feature::new("current_firmware_version", "Current firmware version", container, |s| {
                s.modules()
                    .firmware()
                    .and_then(Firmware::current_version)
                    .map(|v| FeatureValue::String(v.to_owned()))
            }),
            Feature::new("available_firmware_version", "Available firmware version", container, |s| {
                s.modules()
                    .firmware()
                    .and_then(Firmware::latest)
                    .map(|l| FeatureValue::String(l.fw_ver.clone()))
            }),
            Feature::new("update_available", "Update available", container, |s| {
                s.modules()
                    .firmware()
                    .map(|f| f.update_available().into())
            })
            .kind(FeatureType::BinarySensor)
            .icon("mdi:update"),
        ]
    }
}
