//! Energy metering module.

use serde::Deserialize;

use smartlink_domain::feature::FeatureCategory;
use smartlink_domain::message::Request;

use super::{Module, ModuleContext, ModuleError, ModuleKind};
use crate::features::{Container, Feature};

#[derive(Debug, Deserialize)]
struct EnergyUsage {
    /// Watt-hours since midnight.
    #[serde(default)]
    today_energy: i64,
    /// Watt-hours since the start of the month.
    #[serde(default)]
    month_energy: i64,
    /// Milliwatts.
    #[serde(default)]
    current_power: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CurrentPower {
    /// Watts.
    current_power: f64,
}

/// Power and energy readings.
#[derive(Debug, Clone, Default)]
pub struct Energy {
    current_power: Option<f64>,
    today_energy: f64,
    month_energy: f64,
}

impl Energy {
    /// Instantaneous consumption in W.
    #[must_use]
    pub fn current_power(&self) -> Option<f64> {
        self.current_power
    }

    /// Consumption today in kWh.
    #[must_use]
    pub fn consumption_today(&self) -> f64 {
        self.today_energy
    }

    /// Consumption this month in kWh.
    #[must_use]
    pub fn consumption_this_month(&self) -> f64 {
        self.month_energy
    }
}

#[allow(clippy::cast_precision_loss)]
fn thousandths(value: i64) -> f64 {
    value as f64 / 1000.0
}

impl Module for Energy {
    fn query(&self) -> Request {
        [("get_energy_usage", None), ("get_current_power", None)]
            .into_iter()
            .collect()
    }

    fn post_update(&mut self, ctx: &ModuleContext<'_>) -> Result<(), ModuleError> {
        let usage: EnergyUsage = ctx.parse("get_energy_usage")?;
        self.today_energy = thousandths(usage.today_energy);
        self.month_energy = thousandths(usage.month_energy);
        // get_current_power is unreliable on some firmwares; the usage
        // report carries the same value in mW.
        self.current_power = match ctx.parse::<CurrentPower>("get_current_power") {
            Ok(power) => Some(power.current_power),
            Err(_) => usage.current_power.map(thousandths),
        };
        Ok(())
    }

    fn features(&self) -> Vec<Feature> {
        let container = Container::Module(ModuleKind::Energy);
        vec![
            Feature::new("current_consumption", "Current consumption", container, |s| {
                s.modules()
                    .energy()
                    .and_then(Energy::current_power)
                    .map(Into::into)
            })
            .category(FeatureCategory::Primary)
            .unit("W")
            .icon("mdi:lightning-bolt"),
            Feature::new("consumption_today", "Today's consumption", container, |s| {
                s.modules().energy().map(|e| e.consumption_today().into())
            })
            .unit("kWh")
            .icon("mdi:lightning-bolt"),
            Feature::new("consumption_this_month", "This month's consumption", container, |s| {
                s.modules().energy().map(|e| e.consumption_this_month().into())
            })
            .unit("kWh")
            .icon("mdi:lightning-bolt"),
        ]
    }
}
