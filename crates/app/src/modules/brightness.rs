//! Dimming module.

use std::future::Future;

use serde_json::json;

use smartlink_domain::feature::{FeatureCategory, FeatureType};

use super::{Module, ModuleContext, ModuleError, ModuleKind};
use crate::features::{Container, Feature, Setter, set_device_info};

pub(crate) const MIN_BRIGHTNESS: i64 = 1;
pub(crate) const MAX_BRIGHTNESS: i64 = 100;

/// Brightness in percent, read from the info record.
#[derive(Debug, Clone, Default)]
pub struct Brightness {
    level: i64,
}

impl Brightness {
    #[must_use]
    pub fn level(&self) -> i64 {
        self.level
    }
}

impl Module for Brightness {
    fn check_supported(&self, ctx: &ModuleContext<'_>) -> impl Future<Output = bool> + Send {
        let supported = ctx.info.contains("brightness");
        async move { supported }
    }

    fn post_update(&mut self, ctx: &ModuleContext<'_>) -> Result<(), ModuleError> {
        self.level = ctx.info_i64("brightness")?;
        Ok(())
    }

    fn features(&self) -> Vec<Feature> {
        vec![
            Feature::new("brightness", "Brightness", Container::Module(ModuleKind::Brightness), |s| {
                s.modules().brightness().map(|b| b.level().into())
            })
            .category(FeatureCategory::Primary)
            .kind(FeatureType::Number)
            .unit("%")
            .icon("mdi:brightness-4")
            .range(MIN_BRIGHTNESS, MAX_BRIGHTNESS)
            .setter(Setter::Request(|_, value| {
                let level = value.as_i64().unwrap_or_default();
                Ok(set_device_info(json!({ "brightness": level })))
            })),
        ]
    }
}
