//! Virtual hub: sub-GHz sensors as children, with a pairing scan that finds
//! one new contact sensor.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use smartlink_domain::error::ErrorCode;
use smartlink_domain::info::encode_base64;
use smartlink_domain::message::Response;

use super::{Common, component_list, into_object, merge_info, unknown_child, unknown_method};

const COMPONENTS: &[(&str, u32)] = &[
    ("device", 2),
    ("time", 1),
    ("firmware", 2),
    ("cloud_connect", 1),
    ("child_device", 1),
    ("child_quick_setup", 1),
];

const SENSOR_COMPONENTS: &[(&str, u32)] = &[("device", 2)];

const SUPPORTED_CATEGORIES: [&str; 2] = ["subg.trigger", "subg.plugswitch"];

/// Category of the sensor the scan turns up.
const DETECTED_CATEGORY: &str = "subg.trigger";

/// Scan polls answered empty before the new sensor shows up.
const EMPTY_POLLS: u32 = 2;

/// A simulated hub with child sensors.
#[derive(Debug)]
pub struct VirtualHub {
    common: Common,
    sensors: BTreeMap<String, Map<String, Value>>,
    /// Polls answered since scanning began; `None` when not scanning.
    scan: Option<u32>,
    next_sensor: u32,
}

impl Default for VirtualHub {
    fn default() -> Self {
        let info = json!({
            "device_id": "virtual-hub",
            "type": "SMART.TAPOHUB",
            "model": "H100",
            "hw_ver": "1.0",
            "mac": "5C-62-8B-00-00-03",
            "oem_id": "virtual",
            "nickname": encode_base64("Virtual Hub"),
            "in_alarm": false,
        });
        let mut hub = Self {
            common: Common::new(info, COMPONENTS),
            sensors: BTreeMap::new(),
            scan: None,
            next_sensor: 1,
        };
        let first = hub.detected_sensor();
        hub.attach(&first);
        hub
    }
}

impl VirtualHub {
    pub(crate) fn handle(&mut self, target: Option<&str>, method: &str, params: Option<&Value>) -> Response {
        if let Some(child) = target {
            let Some(sensor) = self.sensors.get_mut(child) else {
                return unknown_child();
            };
            return match method {
                "get_device_info" => Response::Ok(Value::Object(sensor.clone())),
                "set_device_info" => merge_info(sensor, params),
                _ => unknown_method(),
            };
        }
        if let Some(response) = self.common.handle(method, params) {
            return response;
        }
        match method {
            "get_child_device_list" => {
                let list: Vec<Value> = self.sensors.values().cloned().map(Value::Object).collect();
                let sum = list.len();
                Response::Ok(json!({ "child_device_list": list, "start_index": 0, "sum": sum }))
            }
            "get_child_device_component_list" => {
                let list: Vec<Value> = self
                    .sensors
                    .keys()
                    .map(|id| {
                        let mut entry = component_list(SENSOR_COMPONENTS);
                        entry["device_id"] = json!(id);
                        entry
                    })
                    .collect();
                let sum = list.len();
                Response::Ok(json!({ "child_component_list": list, "start_index": 0, "sum": sum }))
            }
            "get_support_child_device_category" => {
                let list: Vec<Value> = SUPPORTED_CATEGORIES
                    .iter()
                    .map(|category| json!({ "category": category }))
                    .collect();
                Response::Ok(json!({ "device_category_list": list }))
            }
            "begin_scanning_child_device" => {
                self.scan = Some(0);
                Response::Ok(json!({}))
            }
            "get_scan_child_device_list" => self.poll_scan(params),
            "add_child_device_list" => self.add(params),
            "remove_child_device_list" => self.remove(params),
            _ => unknown_method(),
        }
    }

    pub(crate) fn info(&self, child: Option<&str>) -> Option<Value> {
        match child {
            None => Some(Value::Object(self.common.info().clone())),
            Some(id) => self.sensors.get(id).cloned().map(Value::Object),
        }
    }

    fn poll_scan(&mut self, params: Option<&Value>) -> Response {
        let Some(scan_list) = params.and_then(|p| p.get("scan_list")).and_then(Value::as_array) else {
            return invalid_parameters();
        };
        let wanted = scan_list
            .iter()
            .any(|entry| entry.get("category").and_then(Value::as_str) == Some(DETECTED_CATEGORY));
        let Some(polls) = self.scan.as_mut() else {
            return Response::Ok(json!({ "child_device_list": [], "scan_status": "idle" }));
        };
        *polls += 1;
        if !wanted || *polls <= EMPTY_POLLS {
            return Response::Ok(json!({ "child_device_list": [], "scan_status": "scanning" }));
        }
        Response::Ok(json!({
            "child_device_list": [self.detected_sensor()],
            "scan_status": "scan_idle",
        }))
    }

    fn add(&mut self, params: Option<&Value>) -> Response {
        let Some(entries) = child_list(params) else {
            return invalid_parameters();
        };
        for entry in entries {
            self.attach(entry);
        }
        self.scan = None;
        Response::Ok(json!({}))
    }

    fn remove(&mut self, params: Option<&Value>) -> Response {
        let Some(entries) = child_list(params) else {
            return invalid_parameters();
        };
        let mut removed = 0;
        for id in entries.iter().filter_map(|e| e.get("device_id").and_then(Value::as_str)) {
            if self.sensors.remove(id).is_some() {
                removed += 1;
            }
        }
        if removed == 0 {
            return unknown_child();
        }
        Response::Ok(json!({}))
    }

    /// The entry the scan reports for the next sensor.
    fn detected_sensor(&self) -> Value {
        json!({
            "device_id": format!("virtual-sensor-{}", self.next_sensor),
            "category": DETECTED_CATEGORY,
            "device_type": "SMART.TAPOSENSOR",
            "model": "T110",
            "nickname": encode_base64("Contact Sensor"),
        })
    }

    fn attach(&mut self, entry: &Value) {
        let Some(id) = entry.get("device_id").and_then(Value::as_str) else {
            tracing::debug!(%entry, "ignoring child entry without device id");
            return;
        };
        let field = |key: &str, default: &str| {
            entry
                .get(key)
                .cloned()
                .unwrap_or_else(|| json!(default))
        };
        let info = json!({
            "device_id": id,
            "type": field("device_type", "SMART.TAPOSENSOR"),
            "model": field("model", "T110"),
            "category": field("category", DETECTED_CATEGORY),
            "nickname": field("nickname", ""),
            "parent_device_id": self.common.info().get("device_id"),
            "status": "online",
            "at_low_battery": false,
            "open": false,
        });
        self.sensors.insert(id.to_owned(), into_object(info));
        self.next_sensor += 1;
    }
}

fn child_list(params: Option<&Value>) -> Option<&Vec<Value>> {
    params
        .and_then(|p| p.get("child_device_list"))
        .and_then(Value::as_array)
}

fn invalid_parameters() -> Response {
    Response::Err(ErrorCode::InvalidParameters)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_list() -> Value {
        json!({"scan_list": [{"category": "subg.trigger"}, {"category": "subg.plugswitch"}]})
    }

    #[test]
    fn should_start_with_one_sensor() {
        let mut hub = VirtualHub::default();

        let list = hub.handle(None, "get_child_device_list", None);

        let payload = list.payload().unwrap();
        assert_eq!(payload["sum"], json!(1));
        assert_eq!(payload["child_device_list"][0]["device_id"], json!("virtual-sensor-1"));
    }

    #[test]
    fn should_report_new_sensor_after_a_few_polls() {
        let mut hub = VirtualHub::default();
        hub.handle(None, "begin_scanning_child_device", None);

        let first = hub.handle(None, "get_scan_child_device_list", Some(&scan_list()));
        let second = hub.handle(None, "get_scan_child_device_list", Some(&scan_list()));
        let third = hub.handle(None, "get_scan_child_device_list", Some(&scan_list()));

        assert_eq!(first.payload().unwrap()["child_device_list"], json!([]));
        assert_eq!(second.payload().unwrap()["child_device_list"], json!([]));
        assert_eq!(
            third.payload().unwrap()["child_device_list"][0]["device_id"],
            json!("virtual-sensor-2")
        );
    }

    #[test]
    fn should_find_nothing_outside_requested_categories() {
        let mut hub = VirtualHub::default();
        hub.handle(None, "begin_scanning_child_device", None);
        let params = json!({"scan_list": [{"category": "subg.plugswitch"}]});

        for _ in 0..5 {
            let poll = hub.handle(None, "get_scan_child_device_list", Some(&params));
            assert_eq!(poll.payload().unwrap()["child_device_list"], json!([]));
        }
    }

    #[test]
    fn should_attach_added_sensor_and_detach_removed_one() {
        let mut hub = VirtualHub::default();
        let added = json!({"child_device_list": [{"device_id": "virtual-sensor-2", "device_type": "SMART.TAPOSENSOR"}]});

        hub.handle(None, "add_child_device_list", Some(&added));
        assert!(hub.info(Some("virtual-sensor-2")).is_some());

        let removed = json!({"child_device_list": [{"device_id": "virtual-sensor-1"}]});
        hub.handle(None, "remove_child_device_list", Some(&removed));
        assert!(hub.info(Some("virtual-sensor-1")).is_none());
        assert!(hub.info(Some("virtual-sensor-2")).is_some());
    }

    #[test]
    fn should_reject_removal_of_unknown_sensor() {
        let mut hub = VirtualHub::default();
        let params = json!({"child_device_list": [{"device_id": "nope"}]});

        let response = hub.handle(None, "remove_child_device_list", Some(&params));

        assert_eq!(response, Response::Err(ErrorCode::InvalidParameters));
    }

    #[test]
    fn should_reject_scan_poll_without_scan_list() {
        let mut hub = VirtualHub::default();
        let response = hub.handle(None, "get_scan_child_device_list", None);
        assert_eq!(response, Response::Err(ErrorCode::InvalidParameters));
    }
}
