//! Virtual power strip: three individually switched, metered sockets.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use smartlink_domain::info::encode_base64;
use smartlink_domain::message::Response;

use super::{Common, component_list, into_object, merge_info, unknown_child, unknown_method};

const COMPONENTS: &[(&str, u32)] = &[
    ("device", 2),
    ("time", 1),
    ("firmware", 2),
    ("cloud_connect", 1),
    ("child_device", 1),
];

const SOCKET_COMPONENTS: &[(&str, u32)] = &[("device", 2), ("energy_monitoring", 1)];

const SOCKET_COUNT: i64 = 3;

#[derive(Debug)]
struct Socket {
    info: Map<String, Value>,
    load_milliwatts: i64,
}

impl Socket {
    fn is_on(&self) -> bool {
        self.info.get("device_on").and_then(Value::as_bool).unwrap_or(false)
    }

    fn current_power(&self) -> i64 {
        if self.is_on() { self.load_milliwatts } else { 0 }
    }

    #[allow(clippy::cast_precision_loss)]
    fn current_power_watts(&self) -> f64 {
        self.current_power() as f64 / 1000.0
    }

    fn handle(&mut self, method: &str, params: Option<&Value>) -> Response {
        match method {
            "get_device_info" => Response::Ok(Value::Object(self.info.clone())),
            "set_device_info" => merge_info(&mut self.info, params),
            "get_energy_usage" => Response::Ok(json!({
                "today_energy": self.load_milliwatts / 100,
                "month_energy": self.load_milliwatts * 3,
                "current_power": self.current_power(),
            })),
            "get_current_power" => Response::Ok(json!({ "current_power": self.current_power_watts() })),
            _ => unknown_method(),
        }
    }
}

/// A simulated power strip with child sockets.
#[derive(Debug)]
pub struct VirtualStrip {
    common: Common,
    sockets: BTreeMap<String, Socket>,
}

impl Default for VirtualStrip {
    fn default() -> Self {
        let info = json!({
            "device_id": "virtual-strip",
            "type": "SMART.TAPOPLUG",
            "model": "P300",
            "hw_ver": "1.0",
            "mac": "5C-62-8B-00-00-02",
            "oem_id": "virtual",
            "nickname": encode_base64("Virtual Strip"),
        });
        let sockets = (1..=SOCKET_COUNT)
            .map(|position| {
                let id = format!("virtual-strip-socket-{position}");
                let info = json!({
                    "device_id": id.clone(),
                    "type": "SMART.TAPOPLUG",
                    "model": "P300",
                    "position": position,
                    "nickname": encode_base64(&format!("Socket {position}")),
                    "device_on": position == 1,
                    "on_time": 0,
                    "original_device_id": "virtual-strip",
                });
                let socket = Socket {
                    info: into_object(info),
                    load_milliwatts: position * 5_000,
                };
                (id, socket)
            })
            .collect();
        Self {
            common: Common::new(info, COMPONENTS),
            sockets,
        }
    }
}

impl VirtualStrip {
    pub(crate) fn handle(&mut self, target: Option<&str>, method: &str, params: Option<&Value>) -> Response {
        if let Some(child) = target {
            return match self.sockets.get_mut(child) {
                Some(socket) => socket.handle(method, params),
                None => unknown_child(),
            };
        }
        if let Some(response) = self.common.handle(method, params) {
            return response;
        }
        match method {
            "get_child_device_list" => {
                let list: Vec<Value> = self
                    .sockets
                    .values()
                    .map(|s| Value::Object(s.info.clone()))
                    .collect();
                let sum = list.len();
                Response::Ok(json!({ "child_device_list": list, "start_index": 0, "sum": sum }))
            }
            "get_child_device_component_list" => {
                let list: Vec<Value> = self
                    .sockets
                    .keys()
                    .map(|id| {
                        let mut entry = component_list(SOCKET_COMPONENTS);
                        entry["device_id"] = json!(id);
                        entry
                    })
                    .collect();
                let sum = list.len();
                Response::Ok(json!({ "child_component_list": list, "start_index": 0, "sum": sum }))
            }
            _ => unknown_method(),
        }
    }

    pub(crate) fn info(&self, child: Option<&str>) -> Option<Value> {
        match child {
            None => Some(Value::Object(self.common.info().clone())),
            Some(id) => self.sockets.get(id).map(|s| Value::Object(s.info.clone())),
        }
    }
}
