//! Device state: everything known about one device, independent of how it
//! is reached.

use std::sync::OnceLock;

use chrono::TimeDelta;
use serde_json::Value;

use smartlink_domain::capability::CapabilitySet;
use smartlink_domain::category::{DeviceCategory, classify};
use smartlink_domain::error::SmartError;
use smartlink_domain::id::DeviceId;
use smartlink_domain::info::{DeviceInfo, HardwareInfo, Location};
use smartlink_domain::message::{Response, Responses};
use smartlink_domain::time::{DeviceTime, local_now};

use crate::modules::{ModuleContext, ModuleKind, ModuleSet};

/// Snapshot of the parent a child is attached to.
///
/// Refreshed by the parent on every update; the child never owns or
/// mutates its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentRef {
    /// Parent's own id, when known.
    pub device_id: Option<DeviceId>,
    /// Parent's category.
    pub category: DeviceCategory,
    /// Parent's clock at the last update, if it has one.
    pub time: Option<DeviceTime>,
}

impl ParentRef {
    /// Whether the parent is a hub.
    #[must_use]
    pub fn is_hub(&self) -> bool {
        self.category == DeviceCategory::Hub
    }
}

/// Everything known about one device.
#[derive(Debug, Clone, Default)]
pub struct DeviceState {
    pub(crate) host: String,
    pub(crate) child_id: Option<DeviceId>,
    pub(crate) capabilities: CapabilitySet,
    pub(crate) info: DeviceInfo,
    pub(crate) last_update: Responses,
    pub(crate) category: OnceLock<DeviceCategory>,
    pub(crate) modules: ModuleSet,
    pub(crate) parent: Option<ParentRef>,
}

impl DeviceState {
    pub(crate) fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    pub(crate) fn child(
        host: impl Into<String>,
        id: DeviceId,
        info: DeviceInfo,
        capabilities: CapabilitySet,
        parent: ParentRef,
    ) -> Self {
        Self {
            host: host.into(),
            child_id: Some(id),
            capabilities,
            info,
            parent: Some(parent),
            ..Self::default()
        }
    }

    /// Host the transport talks to.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Negotiated capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Raw info record.
    #[must_use]
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Last merged responses.
    #[must_use]
    pub fn internal_state(&self) -> &Responses {
        &self.last_update
    }

    /// Active modules.
    #[must_use]
    pub fn modules(&self) -> &ModuleSet {
        &self.modules
    }

    /// Parent snapshot, for children.
    #[must_use]
    pub fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    /// Whether this device is attached to a parent.
    #[must_use]
    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }

    /// Routing target for requests issued on behalf of this device.
    #[must_use]
    pub fn target(&self) -> Option<DeviceId> {
        self.child_id.clone()
    }

    pub(crate) fn module_context(&self) -> ModuleContext<'_> {
        ModuleContext {
            info: &self.info,
            responses: &self.last_update,
            capabilities: &self.capabilities,
        }
    }

    /// Category, classified once from capabilities and the type tag.
    ///
    /// Before the device has reported anything the result is computed but
    /// not cached.
    #[must_use]
    pub fn category(&self) -> DeviceCategory {
        if self.info.is_empty() {
            return self.classify();
        }
        *self.category.get_or_init(|| self.classify())
    }

    fn classify(&self) -> DeviceCategory {
        let type_tag = self.info.type_tag().unwrap_or_default();
        let classification = classify(&self.capabilities, type_tag);
        if classification.is_ambiguous() && !self.info.is_empty() {
            tracing::warn!(
                host = %self.host,
                type_tag,
                category = %classification.category(),
                "unrecognised device type, falling back"
            );
        }
        classification.category()
    }

    /// Identifier the device reports for itself, or the id it is known by
    /// under its parent.
    #[must_use]
    pub fn device_id(&self) -> Option<DeviceId> {
        self.info.device_id().or_else(|| self.child_id.clone())
    }

    #[must_use]
    pub fn alias(&self) -> Option<String> {
        self.info.alias()
    }

    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.info.model()
    }

    #[must_use]
    pub fn mac(&self) -> Option<String> {
        self.info.mac()
    }

    #[must_use]
    pub fn is_on(&self) -> bool {
        self.info.is_on()
    }

    #[must_use]
    pub fn location(&self) -> Location {
        self.info.location()
    }

    #[must_use]
    pub fn rssi(&self) -> Option<i64> {
        self.info.rssi()
    }

    /// Connected network name; `"No SSID"` when not reported.
    #[must_use]
    pub fn ssid(&self) -> String {
        self.info.ssid().unwrap_or_else(|| "No SSID".to_owned())
    }

    #[must_use]
    pub fn hw_info(&self) -> HardwareInfo {
        self.info.hardware_info()
    }

    /// Whether the device meters energy.
    #[must_use]
    pub fn has_emeter(&self) -> bool {
        self.modules.contains(ModuleKind::Energy)
    }

    /// Cloud connectivity as last reported; false without the module.
    #[must_use]
    pub fn is_cloud_connected(&self) -> bool {
        self.modules.cloud().is_some_and(|c| c.is_connected())
    }

    /// Current device time: the parent's clock for children, then the
    /// device's own clock, then the local clock.
    #[must_use]
    pub fn time(&self) -> DeviceTime {
        self.parent
            .as_ref()
            .and_then(|p| p.time)
            .or_else(|| self.modules.time().and_then(|t| t.time()))
            .unwrap_or_else(local_now)
    }

    /// Time zone region reported by the clock module.
    #[must_use]
    pub fn timezone(&self) -> Option<&str> {
        self.modules.time().and_then(|t| t.region())
    }

    /// When the device was last switched on.
    ///
    /// `None` when the device is off, does not report `on_time`, or reports
    /// one that reaches outside the representable date range.
    #[must_use]
    pub fn on_since(&self) -> Option<DeviceTime> {
        if !self.is_on() {
            return None;
        }
        let on_time = TimeDelta::try_seconds(self.info.on_time()?)?;
        self.time().checked_sub_signed(on_time)
    }

    /// Payload of a method from the last update, or from a raw response map.
    ///
    /// A sentinel counts as absent. An absent payload yields `default` when
    /// one is given.
    ///
    /// # Errors
    ///
    /// Returns [`SmartError::MissingResponse`] when the payload is absent and
    /// there is no default.
    pub fn try_get_response<'a>(
        &'a self,
        responses: Option<&'a Responses>,
        method: &str,
        default: Option<&'a Value>,
    ) -> Result<&'a Value, SmartError> {
        let payload = match responses.unwrap_or(&self.last_update).get(method) {
            Some(Response::Ok(payload)) => Some(payload),
            Some(Response::Err(code)) => {
                tracing::debug!(method, %code, "error sentinel in place of a response");
                None
            }
            None => None,
        };
        payload.or(default).ok_or_else(|| SmartError::MissingResponse {
            method: method.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone};
    use serde_json::json;
    use smartlink_domain::error::ErrorCode;

    use super::*;
    use crate::test_support::state_with_info;

    fn at(secs: i64) -> DeviceTime {
        FixedOffset::east_opt(3600)
            .and_then(|tz| tz.timestamp_opt(secs, 0).single())
            .unwrap()
    }

    fn child_of(parent_time: Option<DeviceTime>, info: Value) -> DeviceState {
        DeviceState::child(
            "127.0.0.1",
            DeviceId::new("child-1").unwrap(),
            DeviceInfo::from_value(info),
            CapabilitySet::default(),
            ParentRef {
                device_id: None,
                category: DeviceCategory::Strip,
                time: parent_time,
            },
        )
    }

    #[test]
    fn should_derive_on_since_from_parent_clock() {
        let state = child_of(Some(at(10_000)), json!({"device_on": true, "on_time": 600}));
        assert_eq!(state.on_since(), Some(at(9_400)));
    }

    #[test]
    fn should_have_no_on_since_when_on_time_is_out_of_range() {
        let state = child_of(
            Some(at(10_000)),
            json!({"device_on": true, "on_time": 1_000_000_000_000_000_000_i64}),
        );
        assert_eq!(state.on_since(), None);
    }

    #[test]
    fn should_have_no_on_since_when_it_predates_the_calendar() {
        let state = child_of(
            Some(at(10_000)),
            json!({"device_on": true, "on_time": 9_000_000_000_000_000_i64}),
        );
        assert_eq!(state.on_since(), None);
    }

    #[test]
    fn should_have_no_on_since_when_off() {
        let state = child_of(Some(at(10_000)), json!({"device_on": false, "on_time": 600}));
        assert_eq!(state.on_since(), None);
    }

    #[test]
    fn should_have_no_on_since_without_on_time() {
        let state = child_of(Some(at(10_000)), json!({"device_on": true}));
        assert_eq!(state.on_since(), None);
    }

    #[test]
    fn should_prefer_parent_clock_for_children() {
        let state = child_of(Some(at(42)), json!({}));
        assert_eq!(state.time(), at(42));
    }

    #[test]
    fn should_fall_back_to_child_id_for_device_id() {
        let state = child_of(None, json!({}));
        assert_eq!(state.device_id().map(|id| id.to_string()).as_deref(), Some("child-1"));
        assert_eq!(state.target(), DeviceId::new("child-1").ok());
    }

    #[test]
    fn should_default_ssid_when_missing() {
        assert_eq!(state_with_info(json!({})).ssid(), "No SSID");
    }

    #[test]
    fn should_cache_category_once_info_is_known() {
        let mut state = state_with_info(json!({"type": "SMART.TAPOHUB"}));
        assert_eq!(state.category(), DeviceCategory::Hub);
        state.info = DeviceInfo::from_value(json!({"type": "SMART.TAPOPLUG"}));
        assert_eq!(state.category(), DeviceCategory::Hub);
    }

    #[test]
    fn should_read_response_from_last_update_or_given_map() {
        let mut state = state_with_info(json!({}));
        state
            .last_update
            .insert("get_device_time", Response::Ok(json!({"timestamp": 1})));
        let other: Responses = [("get_device_time", Response::Ok(json!({"timestamp": 2})))]
            .into_iter()
            .collect();

        assert_eq!(
            state.try_get_response(None, "get_device_time", None).unwrap(),
            &json!({"timestamp": 1})
        );
        assert_eq!(
            state.try_get_response(Some(&other), "get_device_time", None).unwrap(),
            &json!({"timestamp": 2})
        );
    }

    #[test]
    fn should_fall_back_to_default_when_response_is_a_sentinel() {
        let state = state_with_info(json!({}));
        let responses: Responses = [("get_device_time", Response::Err(ErrorCode::UnknownMethod))]
            .into_iter()
            .collect();
        let default = json!({});

        let payload = state
            .try_get_response(Some(&responses), "get_device_time", Some(&default))
            .unwrap();

        assert_eq!(payload, &default);
    }

    #[test]
    fn should_fail_with_missing_response_when_absent_without_default() {
        let state = state_with_info(json!({}));

        let err = state.try_get_response(None, "get_device_time", None).unwrap_err();

        assert!(matches!(err, SmartError::MissingResponse { ref method } if method == "get_device_time"));
    }
}
