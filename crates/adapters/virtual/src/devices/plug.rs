//! Virtual plug: switchable outlet with energy metering.

use serde_json::{Value, json};

use smartlink_domain::info::encode_base64;
use smartlink_domain::message::Response;

use super::{Common, unknown_child, unknown_method};

const COMPONENTS: &[(&str, u32)] = &[
    ("device", 2),
    ("time", 1),
    ("firmware", 2),
    ("cloud_connect", 1),
    ("energy_monitoring", 2),
];

/// Draw while switched on, in mW.
const LOAD_MILLIWATTS: i64 = 12_345;

/// A simulated energy-metering plug.
#[derive(Debug)]
pub struct VirtualPlug {
    common: Common,
    today_energy: i64,
    month_energy: i64,
}

impl Default for VirtualPlug {
    fn default() -> Self {
        let info = json!({
            "device_id": "virtual-plug",
            "type": "SMART.TAPOPLUG",
            "model": "P110",
            "hw_ver": "1.0",
            "mac": "5C-62-8B-00-00-01",
            "oem_id": "virtual",
            "nickname": encode_base64("Virtual Plug"),
            "device_on": true,
            "on_time": 3600,
            "latitude": 525_200,
            "longitude": 134_050,
        });
        Self {
            common: Common::new(info, COMPONENTS),
            today_energy: 412,
            month_energy: 8_675,
        }
    }
}

impl VirtualPlug {
    fn current_power(&self) -> i64 {
        if self.common.is_on() { LOAD_MILLIWATTS } else { 0 }
    }

    #[allow(clippy::cast_precision_loss)]
    fn current_power_watts(&self) -> f64 {
        self.current_power() as f64 / 1000.0
    }

    pub(crate) fn handle(&mut self, target: Option<&str>, method: &str, params: Option<&Value>) -> Response {
        if target.is_some() {
            return unknown_child();
        }
        if let Some(response) = self.common.handle(method, params) {
            return response;
        }
        match method {
            "get_energy_usage" => Response::Ok(json!({
                "today_energy": self.today_energy,
                "month_energy": self.month_energy,
                "today_runtime": 60,
                "month_runtime": 1_800,
                "current_power": self.current_power(),
            })),
            "get_current_power" => Response::Ok(json!({ "current_power": self.current_power_watts() })),
            _ => unknown_method(),
        }
    }

    pub(crate) fn info(&self, child: Option<&str>) -> Option<Value> {
        child.is_none().then(|| Value::Object(self.common.info().clone()))
    }
}
