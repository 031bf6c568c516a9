//! Fan speed module.

use std::future::Future;

use serde_json::json;

use smartlink_domain::error::FeatureError;
use smartlink_domain::feature::{FeatureCategory, FeatureType};

use super::{Module, ModuleContext, ModuleError, ModuleKind};
use crate::features::{Container, Feature, Setter, set_device_info};

const MAX_SPEED: i64 = 4;

/// Fan speed (0 = off, 1–4) and sleep mode.
#[derive(Debug, Clone, Default)]
pub struct Fan {
    speed: i64,
    sleep_mode: bool,
}

impl Fan {
    #[must_use]
    pub fn speed(&self) -> i64 {
        self.speed
    }

    #[must_use]
    pub fn sleep_mode(&self) -> bool {
        self.sleep_mode
    }
}

impl Module for Fan {
    fn check_supported(&self, ctx: &ModuleContext<'_>) -> impl Future<Output = bool> + Send {
        let supported = ctx.info.contains("fan_speed_level");
        async move { supported }
    }

    fn post_update(&mut self, ctx: &ModuleContext<'_>) -> Result<(), ModuleError> {
        self.speed = ctx.info_i64("fan_speed_level")?;
        self.sleep_mode = ctx
            .info
            .get("fan_sleep_mode_on")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        Ok(())
    }

    fn features(&self) -> Vec<Feature> {
        let container = Container::Module(ModuleKind::Fan);
        vec![
            Feature::new("fan_speed_level", "Fan speed level", container, |s| {
                s.modules().fan().map(|f| f.speed().into())
            })
            .category(FeatureCategory::Primary)
            .kind(FeatureType::Number)
            .icon("mdi:fan")
            .range(0, MAX_SPEED)
            .setter(Setter::Request(|_, value| {
                let speed = value.as_i64().unwrap_or_default();
                let params = if speed == 0 {
                    json!({ "device_on": false })
                } else {
                    json!({ "device_on": true, "fan_speed_level": speed })
                };
                Ok(set_device_info(params))
            })),
            Feature::new("fan_sleep_mode", "Fan sleep mode", container, |s| {
                s.modules().fan().map(|f| f.sleep_mode().into())
            })
            .category(FeatureCategory::Config)
            .kind(FeatureType::Switch)
            .icon("mdi:sleep")
            .setter(Setter::Request(|_, value| {
                let on = value.as_bool().ok_or_else(|| FeatureError::InvalidValue {
                    id: "fan_sleep_mode".to_owned(),
                    expected: "a boolean",
                })?;
                Ok(set_device_info(json!({ "fan_sleep_mode_on": on })))
            })),
        ]
    }
}
