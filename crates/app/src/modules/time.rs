//! Device clock module.

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

use smartlink_domain::feature::FeatureCategory;
use smartlink_domain::message::Request;
use smartlink_domain::time::DeviceTime;

use super::{Module, ModuleContext, ModuleError, ModuleKind};
use crate::features::{Container, Feature};

#[derive(Debug, Deserialize)]
struct TimePayload {
    timestamp: i64,
    /// Offset from UTC in minutes.
    time_diff: i32,
    #[serde(default)]
    region: Option<String>,
}

/// Reads the device's wall clock and time zone.
#[derive(Debug, Clone, Default)]
pub struct Time {
    time: Option<DeviceTime>,
    region: Option<String>,
}

impl Time {
    /// Device time at the last update.
    #[must_use]
    pub fn time(&self) -> Option<DeviceTime> {
        self.time
    }

    /// Time zone region, e.g. `Europe/Berlin`.
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }
}

impl Module for Time {
    fn query(&self) -> Request {
        Request::single("get_device_time", None)
    }

    fn post_update(&mut self, ctx: &ModuleContext<'_>) -> Result<(), ModuleError> {
        let payload: TimePayload = ctx.parse("get_device_time")?;
        let offset = FixedOffset::east_opt(payload.time_diff.saturating_mul(60))
            .ok_or(ModuleError::MissingField("time_diff"))?;
        let time = DateTime::from_timestamp(payload.timestamp, 0)
            .ok_or(ModuleError::MissingField("timestamp"))?
            .with_timezone(&offset);
        self.time = Some(time);
        self.region = payload.region;
        Ok(())
    }

    fn features(&self) -> Vec<Feature> {
        vec![
            Feature::new("device_time", "Device time", Container::Module(ModuleKind::Time), |s| {
                s.modules().time().and_then(Time::time).map(Into::into)
            })
            .category(FeatureCategory::Debug)
            .icon("mdi:clock"),
        ]
    }
}
