//! Virtual bulb: dimmable color light with tunable white.

use serde_json::{Value, json};

use smartlink_domain::info::encode_base64;
use smartlink_domain::message::Response;

use super::{Common, unknown_child, unknown_method};

const COMPONENTS: &[(&str, u32)] = &[
    ("device", 2),
    ("time", 1),
    ("firmware", 2),
    ("cloud_connect", 1),
    ("brightness", 1),
    ("color", 1),
    ("color_temperature", 1),
];

/// A simulated color bulb. Every light setting lives in the info record.
#[derive(Debug)]
pub struct VirtualBulb {
    common: Common,
}

impl Default for VirtualBulb {
    fn default() -> Self {
        let info = json!({
            "device_id": "virtual-bulb",
            "type": "SMART.TAPOBULB",
            "model": "L530",
            "hw_ver": "2.0",
            "mac": "5C-62-8B-00-00-04",
            "oem_id": "virtual",
            "nickname": encode_base64("Virtual Bulb"),
            "device_on": false,
            "brightness": 80,
            "hue": 30,
            "saturation": 100,
            "color_temp": 2700,
            "color_temp_range": [2500, 6500],
        });
        Self {
            common: Common::new(info, COMPONENTS),
        }
    }
}

impl VirtualBulb {
    pub(crate) fn handle(&mut self, target: Option<&str>, method: &str, params: Option<&Value>) -> Response {
        if target.is_some() {
            return unknown_child();
        }
        self.common.handle(method, params).unwrap_or_else(unknown_method)
    }

    pub(crate) fn info(&self, child: Option<&str>) -> Option<Value> {
        child.is_none().then(|| Value::Object(self.common.info().clone()))
    }
}
