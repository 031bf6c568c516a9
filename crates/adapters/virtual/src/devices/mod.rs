//! Virtual device implementations: plug, power strip, hub, bulb.
//!
//! Every device answers the base methods through [`Common`] and adds the
//! methods of its own capabilities on top. Child-addressed requests are only
//! understood by parents (strip, hub).

mod bulb;
mod hub;
mod plug;
mod strip;

use std::fmt;

use serde_json::{Map, Value, json};

use smartlink_domain::error::ErrorCode;
use smartlink_domain::info::encode_base64;
use smartlink_domain::message::Response;
use smartlink_domain::time::now;

pub use bulb::VirtualBulb;
pub use hub::VirtualHub;
pub use plug::VirtualPlug;
pub use strip::VirtualStrip;

/// Firmware version every simulated device starts with.
const CURRENT_FIRMWARE: &str = "1.2.0";
/// Firmware version advertised as available.
const LATEST_FIRMWARE: &str = "1.3.0";
const REGION: &str = "Europe/Berlin";
const TIME_DIFF_MINUTES: i64 = 60;

/// The kind of device to simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Plug,
    Strip,
    Hub,
    Bulb,
}

impl DeviceKind {
    /// Short lowercase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Plug => "plug",
            Self::Strip => "strip",
            Self::Hub => "hub",
            Self::Bulb => "bulb",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Wrapper enum for the concrete virtual device types.
#[derive(Debug)]
pub enum VirtualDevice {
    Plug(VirtualPlug),
    Strip(VirtualStrip),
    Hub(VirtualHub),
    Bulb(VirtualBulb),
}

impl VirtualDevice {
    /// Build a device of the given kind in its initial state.
    #[must_use]
    pub fn new(kind: DeviceKind) -> Self {
        match kind {
            DeviceKind::Plug => Self::Plug(VirtualPlug::default()),
            DeviceKind::Strip => Self::Strip(VirtualStrip::default()),
            DeviceKind::Hub => Self::Hub(VirtualHub::default()),
            DeviceKind::Bulb => Self::Bulb(VirtualBulb::default()),
        }
    }

    /// Which kind of device this is.
    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::Plug(_) => DeviceKind::Plug,
            Self::Strip(_) => DeviceKind::Strip,
            Self::Hub(_) => DeviceKind::Hub,
            Self::Bulb(_) => DeviceKind::Bulb,
        }
    }

    /// Answer one method, addressed to the device itself or to one of its
    /// children.
    pub fn handle(&mut self, target: Option<&str>, method: &str, params: Option<&Value>) -> Response {
        match self {
            Self::Plug(d) => d.handle(target, method, params),
            Self::Strip(d) => d.handle(target, method, params),
            Self::Hub(d) => d.handle(target, method, params),
            Self::Bulb(d) => d.handle(target, method, params),
        }
    }

    /// Current info record of the device, or of one of its children.
    #[must_use]
    pub fn info(&self, child: Option<&str>) -> Option<Value> {
        match self {
            Self::Plug(d) => d.info(child),
            Self::Strip(d) => d.info(child),
            Self::Hub(d) => d.info(child),
            Self::Bulb(d) => d.info(child),
        }
    }
}

/// State and behaviour shared by every simulated device.
#[derive(Debug)]
pub(crate) struct Common {
    info: Map<String, Value>,
    components: &'static [(&'static str, u32)],
}

impl Common {
    pub(crate) fn new(info: Value, components: &'static [(&'static str, u32)]) -> Self {
        let mut info = into_object(info);
        info.entry("fw_ver").or_insert_with(|| json!(CURRENT_FIRMWARE));
        info.entry("ssid").or_insert_with(|| json!(encode_base64("Home")));
        info.entry("rssi").or_insert(json!(-48));
        info.entry("signal_level").or_insert(json!(3));
        info.entry("overheated").or_insert(json!(false));
        Self { info, components }
    }

    pub(crate) fn info(&self) -> &Map<String, Value> {
        &self.info
    }

    pub(crate) fn is_on(&self) -> bool {
        self.info.get("device_on").and_then(Value::as_bool).unwrap_or(false)
    }

    /// Answer a base method; `None` when `method` is not one.
    pub(crate) fn handle(&mut self, method: &str, params: Option<&Value>) -> Option<Response> {
        let response = match method {
            "component_nego" => Response::Ok(component_list(self.components)),
            "get_device_info" => Response::Ok(Value::Object(self.info.clone())),
            "set_device_info" => merge_info(&mut self.info, params),
            "get_connect_cloud_state" => Response::Ok(json!({ "status": 0 })),
            "get_device_time" => Response::Ok(json!({
                "timestamp": now().timestamp(),
                "time_diff": TIME_DIFF_MINUTES,
                "region": REGION,
            })),
            "get_latest_fw" => Response::Ok(json!({
                "need_to_upgrade": self.info.get("fw_ver") != Some(&json!(LATEST_FIRMWARE)),
                "fw_ver": LATEST_FIRMWARE,
                "release_note": "Stability improvements.",
            })),
            "device_reboot" | "device_reset" | "set_qs_info" => Response::Ok(json!({})),
            "get_wireless_scan_info" => Response::Ok(access_points()),
            _ => return None,
        };
        Some(response)
    }
}

/// Fields of a JSON object; empty for any other value.
pub(crate) fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Negotiation payload for a component list.
pub(crate) fn component_list(components: &[(&str, u32)]) -> Value {
    let list: Vec<Value> = components
        .iter()
        .map(|(id, version)| json!({ "id": id, "ver_code": version }))
        .collect();
    json!({ "component_list": list })
}

/// Apply a `set_device_info` payload to an info record.
///
/// Switching the device resets `on_time`.
pub(crate) fn merge_info(info: &mut Map<String, Value>, params: Option<&Value>) -> Response {
    let Some(Value::Object(update)) = params else {
        return Response::Err(ErrorCode::InvalidParameters);
    };
    if let Some(on) = update.get("device_on").and_then(Value::as_bool)
        && info.get("device_on").and_then(Value::as_bool) != Some(on)
    {
        info.insert("on_time".to_owned(), json!(0));
    }
    for (key, value) in update {
        info.insert(key.clone(), value.clone());
    }
    Response::Ok(json!({}))
}

/// Answer for methods a device does not implement.
pub(crate) fn unknown_method() -> Response {
    Response::Err(ErrorCode::UnknownMethod)
}

/// Answer for requests addressed to a child the device does not have.
pub(crate) fn unknown_child() -> Response {
    Response::Err(ErrorCode::InvalidParameters)
}

fn access_points() -> Value {
    json!({
        "start_index": 0,
        "sum": 2,
        "ap_list": [
            {
                "ssid": encode_base64("Home"),
                "bssid": "aa:bb:cc:00:00:01",
                "key_type": "wpa2_psk",
                "cipher_type": 2,
                "channel": 6,
                "signal_level": 3,
            },
            {
                "ssid": encode_base64("Guest"),
                "bssid": "aa:bb:cc:00:00:02",
                "key_type": "none",
                "cipher_type": 0,
                "channel": 11,
                "signal_level": 1,
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn common() -> Common {
        Common::new(json!({"device_on": false, "on_time": 500}), &[("device", 2)])
    }

    #[test]
    fn should_list_components_with_versions() {
        let payload = component_list(&[("device", 2), ("time", 1)]);
        assert_eq!(
            payload,
            json!({"component_list": [{"id": "device", "ver_code": 2}, {"id": "time", "ver_code": 1}]})
        );
    }

    #[test]
    fn should_reset_on_time_when_switching() {
        let mut common = common();

        common.handle("set_device_info", Some(&json!({"device_on": true})));

        assert!(common.is_on());
        assert_eq!(common.info()["on_time"], json!(0));
    }

    #[test]
    fn should_keep_on_time_when_state_is_unchanged() {
        let mut common = common();

        common.handle("set_device_info", Some(&json!({"device_on": false, "nickname": "x"})));

        assert_eq!(common.info()["on_time"], json!(500));
        assert_eq!(common.info()["nickname"], json!("x"));
    }

    #[test]
    fn should_reject_set_device_info_without_object() {
        let mut common = common();
        let response = common.handle("set_device_info", None);
        assert_eq!(response, Some(Response::Err(ErrorCode::InvalidParameters)));
    }

    #[test]
    fn should_advertise_newer_firmware() {
        let mut common = common();
        let response = common.handle("get_latest_fw", None).unwrap();
        assert_eq!(response.payload().unwrap()["need_to_upgrade"], json!(true));
    }

    #[test]
    fn should_not_handle_capability_specific_methods() {
        let mut common = common();
        assert!(common.handle("get_energy_usage", None).is_none());
    }
}
