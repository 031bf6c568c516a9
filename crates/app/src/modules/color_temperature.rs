//! White colour temperature module.

use std::future::Future;

use serde_json::{Value, json};

use smartlink_domain::feature::{FeatureCategory, FeatureType};
use smartlink_domain::info::DeviceInfo;

use super::{Module, ModuleContext, ModuleError, ModuleKind};
use crate::features::{Container, Feature, Setter, set_device_info};

const DEFAULT_RANGE: (i64, i64) = (2500, 6500);

fn reported_range(info: &DeviceInfo) -> Option<(i64, i64)> {
    match info.get("color_temp_range")? {
        Value::Array(bounds) => match bounds.as_slice() {
            [min, max] => Some((min.as_i64()?, max.as_i64()?)),
            _ => None,
        },
        _ => None,
    }
}

/// Colour temperature in kelvin.
#[derive(Debug, Clone)]
pub struct ColorTemperature {
    kelvin: i64,
    range: (i64, i64),
}

impl Default for ColorTemperature {
    fn default() -> Self {
        Self {
            kelvin: 0,
            range: DEFAULT_RANGE,
        }
    }
}

impl ColorTemperature {
    /// Current temperature; zero while a hue is active.
    #[must_use]
    pub fn kelvin(&self) -> i64 {
        self.kelvin
    }

    /// Accepted range, inclusive.
    #[must_use]
    pub fn range(&self) -> (i64, i64) {
        self.range
    }
}

impl Module for ColorTemperature {
    fn check_supported(&self, ctx: &ModuleContext<'_>) -> impl Future<Output = bool> + Send {
        // Some bulbs report the capability with a [0, 0] range.
        let supported = reported_range(ctx.info).is_some_and(|(_, max)| max > 0);
        async move { supported }
    }

    fn post_update(&mut self, ctx: &ModuleContext<'_>) -> Result<(), ModuleError> {
        self.kelvin = ctx.info_i64("color_temp")?;
        if let Some(range) = reported_range(ctx.info) {
            self.range = range;
        }
        Ok(())
    }

    fn features(&self) -> Vec<Feature> {
        let (min, max) = self.range;
        vec![
            Feature::new(
                "color_temperature",
                "Color temperature",
                Container::Module(ModuleKind::ColorTemperature),
                |s| {
                    s.modules()
                        .color_temperature()
                        .map(|c| c.kelvin().into())
                },
            )
            .category(FeatureCategory::Primary)
            .kind(FeatureType::Number)
            .unit("K")
            .icon("mdi:thermometer")
            .range(min, max)
            .setter(Setter::Request(|_, value| {
                let kelvin = value.as_i64().unwrap_or_default();
                Ok(set_device_info(json!({ "color_temp": kelvin })))
            })),
        ]
    }
}
