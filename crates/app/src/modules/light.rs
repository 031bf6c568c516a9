//! Composite light.

use serde::Serialize;

use super::{Module, ModuleContext, ModuleError, ModuleSet};

/// Snapshot of everything the light exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LightState {
    pub on: bool,
    pub brightness: Option<i64>,
    pub hue: Option<i64>,
    pub saturation: Option<i64>,
    pub color_temp: Option<i64>,
}

/// Present whenever any of brightness, colour or colour temperature is.
///
/// It has no query of its own; it only aggregates the modules it stands for.
#[derive(Debug, Clone, Default)]
pub struct Light {
    dimmable: bool,
    color: bool,
    variable_color_temp: bool,
}

impl Light {
    /// Build the composite from the modules loaded so far.
    #[must_use]
    pub fn from_modules(modules: &ModuleSet) -> Option<Self> {
        let light = Self {
            dimmable: modules.brightness().is_some(),
            color: modules.color().is_some(),
            variable_color_temp: modules.color_temperature().is_some(),
        };
        (light.dimmable || light.color || light.variable_color_temp).then_some(light)
    }

    #[must_use]
    pub fn is_dimmable(&self) -> bool {
        self.dimmable
    }

    #[must_use]
    pub fn is_color(&self) -> bool {
        self.color
    }

    #[must_use]
    pub fn is_variable_color_temp(&self) -> bool {
        self.variable_color_temp
    }

    /// Aggregate state read from the sibling modules.
    #[must_use]
    pub fn state(&self, on: bool, modules: &ModuleSet) -> LightState {
        let hsv = modules.color().map(super::Color::hsv);
        LightState {
            on,
            brightness: modules.brightness().map(super::Brightness::level),
            hue: hsv.map(|c| c.hue),
            saturation: hsv.map(|c| c.saturation),
            color_temp: modules.color_temperature().map(super::ColorTemperature::kelvin),
        }
    }
}

impl Module for Light {
    fn post_update(&mut self, _ctx: &ModuleContext<'_>) -> Result<(), ModuleError> {
        Ok(())
    }
}
