//! Scripted protocol and device fixtures shared by the unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};

use smartlink_domain::capability::CapabilitySet;
use smartlink_domain::credentials::Credentials;
use smartlink_domain::error::{ErrorCode, TransportError};
use smartlink_domain::info::{DeviceInfo, encode_base64};
use smartlink_domain::message::{Request, Response, Responses};

use crate::config::DeviceConfig;
use crate::device::SmartDevice;
use crate::ports::Protocol;
use crate::state::DeviceState;

type Key = (Option<String>, String);

#[derive(Default)]
struct Script {
    responses: HashMap<Key, Response>,
    queued: HashMap<Key, VecDeque<Value>>,
    failing: HashSet<String>,
    omitted: HashSet<String>,
    fail_batches: bool,
    requests: Vec<Request>,
}

/// Protocol answering from canned per-method responses.
///
/// Unknown methods come back as an `UnknownMethod` sentinel.
#[derive(Default)]
pub(crate) struct ScriptedProtocol {
    script: Mutex<Script>,
}

impl ScriptedProtocol {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, method: &str, payload: Value) {
        self.set((None, method.to_owned()), Response::Ok(payload));
    }

    pub(crate) fn respond_child(&self, child: &str, method: &str, payload: Value) {
        self.set((Some(child.to_owned()), method.to_owned()), Response::Ok(payload));
    }

    pub(crate) fn reject(&self, method: &str, code: ErrorCode) {
        self.set((None, method.to_owned()), Response::Err(code));
    }

    /// Answer the next calls with `payloads`, in order, before falling back
    /// to the regular response.
    pub(crate) fn queue(&self, method: &str, payloads: Vec<Value>) {
        self.script
            .lock()
            .unwrap()
            .queued
            .insert((None, method.to_owned()), payloads.into());
    }

    /// Fail every call containing this method at the transport level.
    pub(crate) fn fail_method(&self, method: &str) {
        self.script.lock().unwrap().failing.insert(method.to_owned());
    }

    /// Leave this method out of every reply, as if the device skipped it.
    pub(crate) fn omit(&self, method: &str) {
        self.script.lock().unwrap().omitted.insert(method.to_owned());
    }

    /// Fail every call with more than one method at the transport level.
    pub(crate) fn fail_batches(&self, fail: bool) {
        self.script.lock().unwrap().fail_batches = fail;
    }

    pub(crate) fn requests(&self) -> Vec<Request> {
        self.script.lock().unwrap().requests.clone()
    }

    pub(crate) fn last_request(&self) -> Option<Request> {
        self.script.lock().unwrap().requests.last().cloned()
    }

    pub(crate) fn queried_methods(&self) -> Vec<String> {
        self.requests()
            .iter()
            .flat_map(|r| r.methods().map(str::to_owned).collect::<Vec<_>>())
            .collect()
    }

    pub(crate) fn clear_requests(&self) {
        self.script.lock().unwrap().requests.clear();
    }

    fn set(&self, key: Key, response: Response) {
        let mut script = self.script.lock().unwrap();
        script.queued.remove(&key);
        script.responses.insert(key, response);
    }

    fn answer(&self, request: Request) -> Result<Responses, TransportError> {
        let mut script = self.script.lock().unwrap();
        script.requests.push(request.clone());
        if script.fail_batches && request.len() > 1 {
            return Err(TransportError::Timeout(Duration::from_secs(5)));
        }
        if request.methods().any(|m| script.failing.contains(m)) {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "scripted failure",
            )));
        }
        let target = request.target().map(ToString::to_string);
        let mut responses = Responses::new();
        for method in request.methods() {
            if script.omitted.contains(method) {
                continue;
            }
            let key = (target.clone(), method.to_owned());
            let queued = script.queued.get_mut(&key).and_then(VecDeque::pop_front);
            let response = match queued {
                Some(payload) => Response::Ok(payload),
                None => script
                    .responses
                    .get(&key)
                    .cloned()
                    .unwrap_or(Response::Err(ErrorCode::UnknownMethod)),
            };
            responses.insert(method, response);
        }
        Ok(responses)
    }
}

impl Protocol for ScriptedProtocol {
    fn query(&self, request: Request) -> impl Future<Output = Result<Responses, TransportError>> + Send {
        let result = self.answer(request);
        async move { result }
    }
}

pub(crate) fn components(ids: &[&str]) -> Value {
    let list: Vec<Value> = ids.iter().map(|id| json!({"id": id, "ver_code": 1})).collect();
    json!({ "component_list": list })
}

pub(crate) fn config() -> DeviceConfig {
    DeviceConfig::new("127.0.0.1").with_credentials(Credentials::new("user@example.com", "secret"))
}

pub(crate) fn state_with_info(info: Value) -> DeviceState {
    let mut state = DeviceState::new("127.0.0.1");
    state.info = DeviceInfo::from_value(info);
    state
}

pub(crate) fn state_with(capabilities: &[(&str, u32)], info: Value) -> DeviceState {
    let mut state = state_with_info(info);
    state.capabilities = capabilities.iter().copied().collect::<CapabilitySet>();
    state
}

fn respond_common_root(protocol: &ScriptedProtocol) {
    protocol.respond("get_connect_cloud_state", json!({"status": 0}));
    protocol.respond(
        "get_device_time",
        json!({"timestamp": 1_700_000_000, "time_diff": 60, "region": "Europe/Berlin"}),
    );
    protocol.respond(
        "get_latest_fw",
        json!({"need_to_upgrade": true, "fw_ver": "1.3.0", "release_note": "fixes"}),
    );
}

/// Energy-metering plug.
pub(crate) fn plug_protocol() -> ScriptedProtocol {
    let protocol = ScriptedProtocol::new();
    protocol.respond(
        "component_nego",
        components(&["device", "time", "firmware", "cloud_connect", "energy_monitoring"]),
    );
    protocol.respond(
        "get_device_info",
        json!({
            "device_id": "plug-1",
            "type": "SMART.TAPOPLUG",
            "model": "P110",
            "fw_ver": "1.2.0",
            "mac": "AA-BB-CC-DD-EE-FF",
            "nickname": encode_base64("Kitchen"),
            "ssid": encode_base64("Home"),
            "device_on": true,
            "on_time": 120,
            "rssi": -52,
            "signal_level": 3,
        }),
    );
    respond_common_root(&protocol);
    protocol.respond("get_energy_usage", json!({"today_energy": 250, "month_energy": 9000}));
    protocol.respond("get_current_power", json!({"current_power": 12.5}));
    protocol
}

/// Two-socket power strip; only the first socket meters energy.
pub(crate) fn strip_protocol() -> ScriptedProtocol {
    let protocol = ScriptedProtocol::new();
    protocol.respond(
        "component_nego",
        components(&["device", "time", "cloud_connect", "child_device"]),
    );
    protocol.respond(
        "get_device_info",
        json!({"device_id": "strip-1", "type": "SMART.TAPOPLUG", "model": "P300", "device_on": true}),
    );
    respond_common_root(&protocol);
    protocol.respond(
        "get_child_device_component_list",
        json!({"child_component_list": [
            {"device_id": "socket-1", "component_list": [
                {"id": "device", "ver_code": 2},
                {"id": "time", "ver_code": 1},
                {"id": "energy_monitoring", "ver_code": 1},
            ]},
            {"device_id": "socket-2", "component_list": [
                {"id": "device", "ver_code": 2},
            ]},
        ]}),
    );
    protocol.respond(
        "get_child_device_list",
        json!({"child_device_list": [
            {"device_id": "socket-1", "device_on": true, "on_time": 30, "nickname": encode_base64("Lamp")},
            {"device_id": "socket-2", "device_on": false},
        ]}),
    );
    protocol.respond_child("socket-1", "get_energy_usage", json!({"today_energy": 10, "month_energy": 100}));
    protocol.respond_child("socket-1", "get_current_power", json!({"current_power": 3.0}));
    protocol
}

/// Hub with one sensor child, able to pair new children.
pub(crate) fn hub_protocol() -> ScriptedProtocol {
    let protocol = ScriptedProtocol::new();
    protocol.respond(
        "component_nego",
        components(&["device", "time", "cloud_connect", "child_device", "child_quick_setup"]),
    );
    protocol.respond(
        "get_device_info",
        json!({"device_id": "hub-1", "type": "SMART.TAPOHUB", "model": "H100"}),
    );
    respond_common_root(&protocol);
    protocol.respond(
        "get_child_device_component_list",
        json!({"child_component_list": [
            {"device_id": "sensor-1", "component_list": [{"id": "device", "ver_code": 2}]},
        ]}),
    );
    protocol.respond(
        "get_child_device_list",
        json!({"child_device_list": [
            {"device_id": "sensor-1", "type": "SMART.TAPOSENSOR", "model": "T110"},
        ]}),
    );
    protocol.respond(
        "get_support_child_device_category",
        json!({"device_category_list": [{"category": "subg.trigger"}, {"category": "subg.plugswitch"}]}),
    );
    protocol.respond("begin_scanning_child_device", json!({}));
    protocol.respond("add_child_device_list", json!({}));
    protocol.respond_child(
        "sensor-1",
        "get_device_info",
        json!({"device_id": "sensor-1", "type": "SMART.TAPOSENSOR", "model": "T110"}),
    );
    protocol
}

/// A plug that completed its first update.
pub(crate) async fn ready_plug() -> (SmartDevice<ScriptedProtocol>, Arc<ScriptedProtocol>) {
    let protocol = Arc::new(plug_protocol());
    let mut device = SmartDevice::with_protocol(config(), Arc::clone(&protocol));
    device
        .update(false)
        .await
        .expect("plug fixture should update");
    (device, protocol)
}
