//! Hue/saturation colour module.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::json;

use smartlink_domain::error::FeatureError;
use smartlink_domain::feature::{FeatureCategory, FeatureType, FeatureValue};

use super::brightness::{MAX_BRIGHTNESS, MIN_BRIGHTNESS};
use super::{Module, ModuleContext, ModuleError, ModuleKind};
use crate::features::{Container, Feature, Setter, set_device_info};

/// Hue (0–360), saturation (0–100) and value (1–100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Hsv {
    pub hue: i64,
    pub saturation: i64,
    pub value: i64,
}

impl Hsv {
    fn parse(value: &FeatureValue) -> Result<Self, FeatureError> {
        let invalid = || FeatureError::InvalidValue {
            id: "hsv".to_owned(),
            expected: "[hue, saturation, value]",
        };
        let FeatureValue::Json(serde_json::Value::Array(parts)) = value else {
            return Err(invalid());
        };
        let numbers: Vec<i64> = parts
            .iter()
            .map(serde_json::Value::as_i64)
            .collect::<Option<_>>()
            .ok_or_else(invalid)?;
        let &[hue, saturation, value] = numbers.as_slice() else {
            return Err(invalid());
        };
        check_range("hue", hue, 0, 360)?;
        check_range("saturation", saturation, 0, 100)?;
        check_range("value", value, MIN_BRIGHTNESS, MAX_BRIGHTNESS)?;
        Ok(Self {
            hue,
            saturation,
            value,
        })
    }
}

fn check_range(id: &str, value: i64, min: i64, max: i64) -> Result<(), FeatureError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(FeatureError::OutOfRange {
            id: id.to_owned(),
            min,
            max,
            value,
        })
    }
}

/// Colour of a bulb or light strip.
#[derive(Debug, Clone, Default)]
pub struct Color {
    hsv: Hsv,
}

impl Color {
    #[must_use]
    pub fn hsv(&self) -> Hsv {
        self.hsv
    }
}

impl Module for Color {
    fn check_supported(&self, ctx: &ModuleContext<'_>) -> impl Future<Output = bool> + Send {
        let supported = ctx.info.contains("hue") && ctx.info.contains("saturation");
        async move { supported }
    }

    fn post_update(&mut self, ctx: &ModuleContext<'_>) -> Result<(), ModuleError> {
        self.hsv = Hsv {
            hue: ctx.info_i64("hue")?,
            saturation: ctx.info_i64("saturation")?,
            value: ctx.info.get_i64("brightness").unwrap_or(MAX_BRIGHTNESS),
        };
        Ok(())
    }

    fn features(&self) -> Vec<Feature> {
        vec![
            Feature::new("hsv", "HSV", Container::Module(ModuleKind::Color), |s| {
                s.modules().color().map(|c| {
                    let hsv = c.hsv();
                    FeatureValue::Json(json!([hsv.hue, hsv.saturation, hsv.value]))
                })
            })
            .category(FeatureCategory::Primary)
            .kind(FeatureType::Unknown)
            .setter(Setter::Request(|_, value| {
                let hsv = Hsv::parse(value)?;
                // color_temp must be cleared for the hue to take effect.
                Ok(set_device_info(json!({
                    "hue": hsv.hue,
                    "saturation": hsv.saturation,
                    "brightness": hsv.value,
                    "color_temp": 0,
                })))
            })),
        ]
    }
}
