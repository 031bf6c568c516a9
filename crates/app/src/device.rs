//! Smart device session — the public handle for one device.
//!
//! A [`SmartDevice`] owns its state, its children and its feature set, and
//! talks to the physical device through a shared [`Protocol`]. Children share
//! the parent's protocol and address their requests with a routing target.
//!
//! The update cycle lives in [`crate::orchestrator`], child handling in
//! [`crate::topology`] and pairing in [`crate::pairing`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};

use smartlink_domain::category::DeviceCategory;
use smartlink_domain::error::{FeatureError, SmartError};
use smartlink_domain::feature::FeatureValue;
use smartlink_domain::id::DeviceId;
use smartlink_domain::info::{DeviceInfo, HardwareInfo, Location, decode_base64, encode_base64};
use smartlink_domain::message::{Request, Response, Responses};
use smartlink_domain::time::{DeviceTime, Timestamp};
use smartlink_domain::wifi::WifiNetwork;

use crate::config::DeviceConfig;
use crate::features::{Feature, FeatureSet, Setter};
use crate::modules::{LightState, ModuleSet};
use crate::ports::Protocol;
use crate::state::DeviceState;

/// Lifecycle of a device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Nothing negotiated yet, or a re-negotiation was requested.
    Uninitialized,
    /// Capabilities, info and modules are known; the first update is pending.
    Negotiated,
    /// At least one full update cycle completed.
    Ready,
}

/// One device (root or child) and everything known about it.
pub struct SmartDevice<P> {
    pub(crate) config: DeviceConfig,
    pub(crate) protocol: Arc<P>,
    pub(crate) state: DeviceState,
    pub(crate) children: BTreeMap<DeviceId, SmartDevice<P>>,
    pub(crate) features: FeatureSet,
    pub(crate) phase: SessionPhase,
    pub(crate) last_update_time: Option<Timestamp>,
}

impl<P> SmartDevice<P> {
    /// Create a session for a root device.
    #[must_use]
    pub fn new(config: DeviceConfig, protocol: P) -> Self {
        Self::with_protocol(config, Arc::new(protocol))
    }

    /// Create a session for a root device around an already shared protocol.
    #[must_use]
    pub fn with_protocol(config: DeviceConfig, protocol: Arc<P>) -> Self {
        Self {
            state: DeviceState::new(config.host.clone()),
            config,
            protocol,
            children: BTreeMap::new(),
            features: FeatureSet::default(),
            phase: SessionPhase::Uninitialized,
            last_update_time: None,
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        self.state.host()
    }

    #[must_use]
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    #[must_use]
    pub fn protocol(&self) -> &Arc<P> {
        &self.protocol
    }

    /// Everything known about the device.
    #[must_use]
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Start of the last full update cycle.
    #[must_use]
    pub fn last_update_time(&self) -> Option<Timestamp> {
        self.last_update_time
    }

    #[must_use]
    pub fn is_child(&self) -> bool {
        self.state.is_child()
    }

    /// Attached children, ordered by id.
    pub fn children(&self) -> impl Iterator<Item = &SmartDevice<P>> {
        self.children.values()
    }

    #[must_use]
    pub fn child(&self, id: &str) -> Option<&SmartDevice<P>> {
        self.children.get(id)
    }

    pub fn child_mut(&mut self, id: &str) -> Option<&mut SmartDevice<P>> {
        self.children.get_mut(id)
    }

    #[must_use]
    pub fn modules(&self) -> &ModuleSet {
        self.state.modules()
    }

    /// Features; empty until the first full update completed.
    #[must_use]
    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    #[must_use]
    pub fn feature(&self, id: &str) -> Option<&Feature> {
        self.features.get(id)
    }

    /// Current value of a feature.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::Unknown`] when the device has no such feature.
    pub fn feature_value(&self, id: &str) -> Result<Option<FeatureValue>, FeatureError> {
        self.features
            .get(id)
            .map(|feature| feature.value(&self.state))
            .ok_or_else(|| FeatureError::Unknown(id.to_owned()))
    }

    #[must_use]
    pub fn device_category(&self) -> DeviceCategory {
        self.state.category()
    }

    #[must_use]
    pub fn is_on(&self) -> bool {
        self.state.is_on()
    }

    #[must_use]
    pub fn is_cloud_connected(&self) -> bool {
        self.state.is_cloud_connected()
    }

    #[must_use]
    pub fn mac_address(&self) -> Option<String> {
        self.state.mac()
    }

    #[must_use]
    pub fn device_id(&self) -> Option<DeviceId> {
        self.state.device_id()
    }

    #[must_use]
    pub fn alias(&self) -> Option<String> {
        self.state.alias()
    }

    #[must_use]
    pub fn location(&self) -> Location {
        self.state.location()
    }

    #[must_use]
    pub fn on_since(&self) -> Option<DeviceTime> {
        self.state.on_since()
    }

    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.state.model()
    }

    #[must_use]
    pub fn time(&self) -> DeviceTime {
        self.state.time()
    }

    #[must_use]
    pub fn timezone(&self) -> Option<&str> {
        self.state.timezone()
    }

    #[must_use]
    pub fn rssi(&self) -> Option<i64> {
        self.state.rssi()
    }

    #[must_use]
    pub fn ssid(&self) -> String {
        self.state.ssid()
    }

    #[must_use]
    pub fn hw_info(&self) -> HardwareInfo {
        self.state.hw_info()
    }

    #[must_use]
    pub fn has_emeter(&self) -> bool {
        self.state.has_emeter()
    }

    /// Last merged responses, keyed by method.
    #[must_use]
    pub fn internal_state(&self) -> &Responses {
        self.state.internal_state()
    }

    /// Aggregate light state, for devices with the composite light.
    #[must_use]
    pub fn light_state(&self) -> Option<LightState> {
        let modules = self.state.modules();
        modules
            .light()
            .map(|light| light.state(self.state.is_on(), modules))
    }

    /// Force a full negotiation on the next update, e.g. after the set of
    /// children changed.
    pub fn request_renegotiation(&mut self) {
        tracing::debug!(host = %self.state.host(), "re-negotiation requested");
        self.phase = SessionPhase::Uninitialized;
    }

    /// Seed the info record from a discovery answer.
    ///
    /// Only takes effect before the device reported anything itself.
    pub fn update_from_discover_info(&mut self, info: Value) {
        if self.state.info.is_empty() {
            self.state.info = DeviceInfo::from_value(info);
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScanResult {
    #[serde(default)]
    ap_list: Vec<WifiNetwork>,
}

impl<P: Protocol> SmartDevice<P> {
    /// Send one method to the device and return its payload.
    ///
    /// # Errors
    ///
    /// Returns [`SmartError::Transport`] when the device cannot be reached,
    /// [`SmartError::Device`] when it rejected the method and
    /// [`SmartError::MissingResponse`] when the answer lacks the method.
    #[tracing::instrument(skip(self, params), fields(host = %self.state.host()))]
    pub async fn query_helper(&self, method: &str, params: Option<Value>) -> Result<Value, SmartError> {
        let request = Request::single(method, params).with_target(self.state.target());
        let mut responses = self.protocol.query(request).await?;
        take_payload(&mut responses, method)
    }

    /// Send a multi-method request addressed to this device and fail on the
    /// first rejected method.
    pub(crate) async fn send(&self, request: Request) -> Result<Responses, SmartError> {
        let request = request.with_target(self.state.target());
        let methods: Vec<String> = request.methods().map(str::to_owned).collect();
        let responses = self.protocol.query(request).await?;
        for method in methods {
            match responses.get(&method) {
                Some(Response::Ok(_)) => {}
                Some(Response::Err(code)) => return Err(SmartError::Device { method, code: *code }),
                None => return Err(SmartError::MissingResponse { method }),
            }
        }
        Ok(responses)
    }

    pub async fn turn_on(&self) -> Result<Value, SmartError> {
        self.set_state(true).await
    }

    pub async fn turn_off(&self) -> Result<Value, SmartError> {
        self.set_state(false).await
    }

    /// Switch the relay or light.
    ///
    /// # Errors
    ///
    /// See [`query_helper`](Self::query_helper).
    pub async fn set_state(&self, on: bool) -> Result<Value, SmartError> {
        self.query_helper("set_device_info", Some(json!({ "device_on": on })))
            .await
    }

    /// Rename the device.
    ///
    /// # Errors
    ///
    /// See [`query_helper`](Self::query_helper).
    pub async fn set_alias(&self, alias: &str) -> Result<Value, SmartError> {
        let nickname = encode_base64(alias);
        self.query_helper("set_device_info", Some(json!({ "nickname": nickname })))
            .await
    }

    /// Reboot after `delay_secs` seconds.
    ///
    /// # Errors
    ///
    /// See [`query_helper`](Self::query_helper).
    pub async fn reboot(&self, delay_secs: u32) -> Result<Value, SmartError> {
        self.query_helper("device_reboot", Some(json!({ "delay": delay_secs })))
            .await
    }

    /// Reset the device to factory settings. The device is unusable until
    /// it is set up again.
    ///
    /// # Errors
    ///
    /// See [`query_helper`](Self::query_helper).
    pub async fn factory_reset(&self) -> Result<Value, SmartError> {
        self.query_helper("device_reset", None).await
    }

    /// List the wireless networks the device can see.
    ///
    /// # Errors
    ///
    /// See [`query_helper`](Self::query_helper); [`SmartError::Payload`] when
    /// the scan result is malformed.
    pub async fn wifi_scan(&self) -> Result<Vec<WifiNetwork>, SmartError> {
        const METHOD: &str = "get_wireless_scan_info";
        let payload = self
            .query_helper(METHOD, Some(json!({ "start_index": 0 })))
            .await?;
        let scan = ScanResult::deserialize(payload).map_err(|source| SmartError::Payload {
            method: METHOD.to_owned(),
            source,
        })?;
        Ok(scan
            .ap_list
            .into_iter()
            .map(|mut network| {
                if let Some(ssid) = decode_base64(&network.ssid) {
                    network.ssid = ssid;
                }
                network
            })
            .collect())
    }

    /// Move the device to another wireless network.
    ///
    /// The device drops the connection as soon as it switches networks, so
    /// any failure after sending that the device did not report itself is
    /// expected and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`SmartError::Authentication`] without username/password,
    /// [`SmartError::MissingResponse`] before the device clock was read and
    /// [`SmartError::Device`] when the device rejected the request.
    #[tracing::instrument(skip(self, password), fields(host = %self.state.host()))]
    pub async fn wifi_join(&self, ssid: &str, password: &str, key_type: &str) -> Result<(), SmartError> {
        let credentials = self
            .config
            .credentials
            .as_ref()
            .ok_or(SmartError::Authentication)?;
        let time = self.device_time_payload()?;
        let payload = json!({
            "account": {
                "username": encode_base64(&credentials.username),
                "password": encode_base64(&credentials.password),
            },
            "time": time,
            "wireless_info": {
                "ssid": encode_base64(ssid),
                "password": encode_base64(password),
                "key_type": key_type,
            },
        });
        match self.query_helper("set_qs_info", Some(payload)).await {
            Ok(_) => Ok(()),
            Err(error) if error.is_device_reported() => Err(error),
            Err(error) => {
                tracing::debug!(%error, "no usable answer after joining network");
                Ok(())
            }
        }
    }

    /// Change the account the device is bound to.
    ///
    /// # Errors
    ///
    /// Returns [`SmartError::MissingResponse`] before the device clock was
    /// read; otherwise see [`query_helper`](Self::query_helper).
    #[tracing::instrument(skip(self, password), fields(host = %self.state.host()))]
    pub async fn update_credentials(&self, username: &str, password: &str) -> Result<Value, SmartError> {
        let time = self.device_time_payload()?;
        let payload = json!({
            "account": {
                "username": encode_base64(username),
                "password": encode_base64(password),
            },
            "time": time,
        });
        self.query_helper("set_qs_info", Some(payload)).await
    }

    fn device_time_payload(&self) -> Result<Value, SmartError> {
        self.state
            .try_get_response(None, "get_device_time", None)
            .cloned()
    }

    /// Apply a feature value.
    ///
    /// Returns the device's answer; for the pairing action, the outcome of
    /// the pairing session (`null` when nothing was found).
    ///
    /// # Errors
    ///
    /// Returns [`SmartError::Feature`] for unknown, read-only or invalid
    /// input; otherwise the errors of the underlying request.
    pub async fn set_feature_value(&mut self, id: &str, value: FeatureValue) -> Result<Value, SmartError> {
        let feature = self
            .features
            .get(id)
            .cloned()
            .ok_or_else(|| FeatureError::Unknown(id.to_owned()))?;
        feature.validate(&value)?;
        match feature.setter_kind() {
            Some(Setter::Request(build)) => {
                let request = build(&self.state, &value)?;
                let responses = self.send(request).await?;
                Ok(responses.to_json())
            }
            Some(Setter::Pair) => {
                let outcome = self.pair(None).await?;
                Ok(outcome.map_or(Value::Null, |o| json!({ "child_device_list": o.devices })))
            }
            None => Err(FeatureError::ReadOnly(id.to_owned()).into()),
        }
    }

    /// Release the transport.
    pub async fn close(&self) {
        self.protocol.close().await;
    }
}

pub(crate) fn take_payload(responses: &mut Responses, method: &str) -> Result<Value, SmartError> {
    match responses.remove(method) {
        Some(Response::Ok(value)) => Ok(value),
        Some(Response::Err(code)) => Err(SmartError::Device {
            method: method.to_owned(),
            code,
        }),
        None => Err(SmartError::MissingResponse {
            method: method.to_owned(),
        }),
    }
}

impl<P> fmt::Debug for SmartDevice<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmartDevice")
            .field("host", &self.state.host())
            .field("device_id", &self.state.device_id())
            .field("phase", &self.phase)
            .field("modules", &self.state.modules().kinds().collect::<Vec<_>>())
            .field("children", &self.children.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use smartlink_domain::credentials::Credentials;
    use smartlink_domain::error::ErrorCode;

    use super::*;
    use crate::test_support::{ScriptedProtocol, config, plug_protocol, ready_plug};

    #[tokio::test]
    async fn should_send_device_on_flag() {
        let protocol = Arc::new(ScriptedProtocol::new());
        protocol.respond("set_device_info", json!({}));
        let device = SmartDevice::with_protocol(config(), Arc::clone(&protocol));

        device.turn_off().await.unwrap();

        let request = protocol.last_request().unwrap();
        assert_eq!(request.params("set_device_info"), Some(&json!({"device_on": false})));
        assert_eq!(request.target(), None);
    }

    #[tokio::test]
    async fn should_encode_alias_as_base64() {
        let protocol = Arc::new(ScriptedProtocol::new());
        protocol.respond("set_device_info", json!({}));
        let device = SmartDevice::with_protocol(config(), Arc::clone(&protocol));

        device.set_alias("Desk lamp").await.unwrap();

        let request = protocol.last_request().unwrap();
        assert_eq!(
            request.params("set_device_info"),
            Some(&json!({"nickname": encode_base64("Desk lamp")}))
        );
    }

    #[tokio::test]
    async fn should_surface_device_rejection() {
        let protocol = ScriptedProtocol::new();
        protocol.reject("device_reboot", ErrorCode::InvalidParameters);
        let device = SmartDevice::new(config(), protocol);

        let err = device.reboot(1).await.unwrap_err();

        assert!(matches!(
            err,
            SmartError::Device { ref method, code: ErrorCode::InvalidParameters } if method == "device_reboot"
        ));
    }

    #[tokio::test]
    async fn should_surface_transport_failure_for_one_shot_calls() {
        let protocol = ScriptedProtocol::new();
        protocol.fail_method("device_reset");
        let device = SmartDevice::new(config(), protocol);

        let err = device.factory_reset().await.unwrap_err();

        assert!(matches!(err, SmartError::Transport(_)));
    }

    #[tokio::test]
    async fn should_decode_ssids_of_scanned_networks() {
        let protocol = ScriptedProtocol::new();
        protocol.respond(
            "get_wireless_scan_info",
            json!({"ap_list": [
                {"ssid": encode_base64("Home"), "key_type": "wpa2_psk", "signal_level": 3, "bssid": "aa"},
                {"ssid": encode_base64("Guest"), "key_type": "none", "signal_level": 1, "bssid": "bb"},
            ]}),
        );
        let device = SmartDevice::new(config(), protocol);

        let networks = device.wifi_scan().await.unwrap();

        let ssids: Vec<_> = networks.iter().map(|n| n.ssid.as_str()).collect();
        assert_eq!(ssids, vec!["Home", "Guest"]);
        assert_eq!(networks[0].signal_level, 3);
    }

    #[tokio::test]
    async fn should_require_credentials_to_join_wifi() {
        let device = SmartDevice::new(DeviceConfig::new("127.0.0.1").with_credentials_hash("h"), ScriptedProtocol::new());

        let err = device.wifi_join("Home", "pw", "wpa2_psk").await.unwrap_err();

        assert!(matches!(err, SmartError::Authentication));
    }

    #[tokio::test]
    async fn should_ignore_dropped_connection_when_joining_wifi() {
        let (device, protocol) = ready_plug().await;
        protocol.fail_method("set_qs_info");

        device.wifi_join("Home", "pw", "wpa2_psk").await.unwrap();

        let request = protocol.last_request().unwrap();
        let params = request.params("set_qs_info").unwrap();
        assert_eq!(params["wireless_info"]["ssid"], json!(encode_base64("Home")));
        assert_eq!(params["time"]["region"], json!("Europe/Berlin"));
    }

    #[tokio::test]
    async fn should_ignore_missing_answer_when_joining_wifi() {
        let (device, protocol) = ready_plug().await;
        protocol.omit("set_qs_info");

        let result = device.wifi_join("Home", "pw", "wpa2_psk").await;

        assert!(result.is_ok());
        assert!(protocol.queried_methods().contains(&"set_qs_info".to_string()));
    }

    #[tokio::test]
    async fn should_propagate_device_rejection_when_joining_wifi() {
        let (device, protocol) = ready_plug().await;
        protocol.reject("set_qs_info", ErrorCode::InvalidParameters);

        let err = device.wifi_join("Home", "pw", "wpa2_psk").await.unwrap_err();

        assert!(err.is_device_reported());
    }

    #[tokio::test]
    async fn should_need_device_time_to_update_credentials() {
        let device = SmartDevice::new(config(), plug_protocol());

        let err = device.update_credentials("a", "b").await.unwrap_err();

        assert!(matches!(err, SmartError::MissingResponse { ref method } if method == "get_device_time"));
    }

    #[tokio::test]
    async fn should_send_encoded_account_when_updating_credentials() {
        let (device, protocol) = ready_plug().await;
        protocol.respond("set_qs_info", json!({}));

        device.update_credentials("new@example.com", "pw").await.unwrap();

        let request = protocol.last_request().unwrap();
        let params = request.params("set_qs_info").unwrap();
        assert_eq!(params["account"]["username"], json!(encode_base64("new@example.com")));
        assert!(params.get("wireless_info").is_none());
    }

    #[tokio::test]
    async fn should_reject_unknown_and_read_only_features() {
        let (mut device, _) = ready_plug().await;

        let unknown = device.set_feature_value("nope", FeatureValue::Bool(true)).await;
        let read_only = device.set_feature_value("rssi", FeatureValue::Int(1)).await;

        assert!(matches!(unknown, Err(SmartError::Feature(FeatureError::Unknown(_)))));
        assert!(matches!(read_only, Err(SmartError::Feature(FeatureError::ReadOnly(_)))));
    }

    #[tokio::test]
    async fn should_apply_switch_feature_through_setter() {
        let (mut device, protocol) = ready_plug().await;
        protocol.respond("set_device_info", json!({}));

        device
            .set_feature_value("state", FeatureValue::Bool(true))
            .await
            .unwrap();

        let request = protocol.last_request().unwrap();
        assert_eq!(request.params("set_device_info"), Some(&json!({"device_on": true})));
    }

    #[tokio::test]
    async fn should_keep_discovery_info_only_before_first_negotiation() {
        let mut device = SmartDevice::new(config(), ScriptedProtocol::new());
        device.update_from_discover_info(json!({"model": "P110"}));
        device.update_from_discover_info(json!({"model": "other"}));
        assert_eq!(device.model(), Some("P110"));
    }

    #[test]
    fn should_not_derive_on_since_from_absurd_on_time() {
        let mut device = SmartDevice::new(config(), ScriptedProtocol::new());
        device.update_from_discover_info(json!({"device_on": true, "on_time": 1_000_000_000_000_000_i64}));

        assert!(device.is_on());
        assert_eq!(device.on_since(), None);
    }

    #[test]
    fn should_redact_password_in_config_debug_output() {
        let config = DeviceConfig::new("h").with_credentials(Credentials::new("u", "secret"));
        assert!(!format!("{config:?}").contains("secret"));
    }
}
