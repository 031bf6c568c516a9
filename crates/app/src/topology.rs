//! Topology: building children and keeping their info fresh.
//!
//! The parent owns its children outright. Children only carry a
//! [`ParentRef`] snapshot, rewritten by the parent on every update.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use smartlink_domain::capability::{CapabilitySet, parse_child_capabilities};
use smartlink_domain::error::SmartError;
use smartlink_domain::id::DeviceId;
use smartlink_domain::info::DeviceInfo;
use smartlink_domain::message::{Request, Response, Responses};

use crate::device::{SessionPhase, SmartDevice, take_payload};
use crate::features::FeatureSet;
use crate::loader::load_modules;
use crate::modules::{MODULE_DESCRIPTORS, Time};
use crate::ports::Protocol;
use crate::state::{DeviceState, ParentRef};

const CHILD_LIST: &str = "get_child_device_list";
const CHILD_COMPONENTS: &str = "get_child_device_component_list";

fn child_entries(payload: &Value) -> &[Value] {
    payload
        .get("child_device_list")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

impl<P> SmartDevice<P> {
    /// Snapshot of this device as seen by its children.
    pub(crate) fn parent_ref(&self) -> ParentRef {
        ParentRef {
            device_id: self.state.device_id(),
            category: self.state.category(),
            time: self.state.modules().time().and_then(Time::time),
        }
    }

    /// Push each listed child's info record into the matching child.
    ///
    /// This is the only path that refreshes a child's info.
    pub(crate) fn push_child_info(&mut self) {
        let Some(listing) = self.state.last_update.payload(CHILD_LIST) else {
            return;
        };
        for raw in child_entries(listing) {
            let info = DeviceInfo::from_value(raw.clone());
            let Some(id) = info.device_id() else {
                tracing::debug!(host = %self.state.host, "child entry without device id");
                continue;
            };
            match self.children.get_mut(&id) {
                Some(child) => child.state.info = info,
                None => tracing::debug!(host = %self.state.host, child = %id, "ignoring unknown child"),
            }
        }
    }
}

impl<P: Protocol> SmartDevice<P> {
    /// Fetch the child listing and per-child capabilities in one round trip
    /// and build every child with its own modules.
    ///
    /// Only called right after negotiation, while the child map is empty.
    pub(crate) async fn initialize_children(&mut self) -> Result<(), SmartError> {
        let request: Request = [(CHILD_COMPONENTS, None), (CHILD_LIST, None)].into_iter().collect();
        let mut responses = self.protocol.query(request).await?;
        let components = take_payload(&mut responses, CHILD_COMPONENTS)?;
        let listing = take_payload(&mut responses, CHILD_LIST)?;
        let mut capabilities = parse_child_capabilities(&components)?;

        let parent = self.parent_ref();
        let mut children = BTreeMap::new();
        for raw in child_entries(&listing) {
            let info = DeviceInfo::from_value(raw.clone());
            let Some(id) = info.device_id() else {
                tracing::warn!(host = %self.state.host, "skipping child without device id");
                continue;
            };
            let child_capabilities = capabilities.remove(&id).unwrap_or_else(|| {
                tracing::warn!(host = %self.state.host, child = %id, "child reported no components");
                CapabilitySet::default()
            });
            let child = self
                .spawn_child(id.clone(), info, child_capabilities, parent.clone())
                .await;
            children.insert(id, child);
        }

        tracing::debug!(host = %self.state.host, count = children.len(), "children initialized");
        self.children = children;
        let fetched: Responses = [
            (CHILD_COMPONENTS, Response::Ok(components)),
            (CHILD_LIST, Response::Ok(listing)),
        ]
        .into_iter()
        .collect();
        self.state.last_update.merge(fetched);
        Ok(())
    }

    async fn spawn_child(
        &self,
        id: DeviceId,
        info: DeviceInfo,
        capabilities: CapabilitySet,
        parent: ParentRef,
    ) -> SmartDevice<P> {
        let mut state = DeviceState::child(self.state.host.clone(), id, info, capabilities, parent);
        state.modules = load_modules(&state, MODULE_DESCRIPTORS).await;
        SmartDevice {
            config: self.config.clone(),
            protocol: Arc::clone(&self.protocol),
            state,
            children: BTreeMap::new(),
            features: FeatureSet::default(),
            phase: SessionPhase::Negotiated,
            last_update_time: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use smartlink_domain::category::DeviceCategory;

    use super::*;
    use crate::modules::ModuleKind;
    use crate::test_support::{ScriptedProtocol, config, hub_protocol, strip_protocol};

    #[tokio::test]
    async fn should_build_children_with_their_own_capabilities() {
        let mut device = SmartDevice::new(config(), strip_protocol());

        device.update(false).await.unwrap();

        assert_eq!(device.device_category(), DeviceCategory::Strip);
        let first = device.child("socket-1").unwrap();
        let second = device.child("socket-2").unwrap();
        assert!(first.is_child());
        assert!(first.state().capabilities().contains("energy_monitoring"));
        assert!(!second.state().capabilities().contains("energy_monitoring"));
    }

    #[tokio::test]
    async fn should_not_load_root_only_modules_on_strip_sockets() {
        let mut device = SmartDevice::new(config(), strip_protocol());

        device.update(false).await.unwrap();

        let socket = device.child("socket-1").unwrap();
        assert!(!socket.modules().contains(ModuleKind::Time));
        assert!(!socket.modules().contains(ModuleKind::DeviceInfo));
        assert!(socket.modules().contains(ModuleKind::Energy));
    }

    #[tokio::test]
    async fn should_load_root_only_modules_on_hub_children() {
        let mut device = SmartDevice::new(config(), hub_protocol());

        device.update(true).await.unwrap();

        let sensor = device.child("sensor-1").unwrap();
        assert!(sensor.modules().contains(ModuleKind::DeviceInfo));
        assert_eq!(sensor.state().parent().map(|p| p.category), Some(DeviceCategory::Hub));
    }

    #[tokio::test]
    async fn should_share_parent_protocol_and_route_by_child_id() {
        let protocol = Arc::new(strip_protocol());
        let mut device = SmartDevice::with_protocol(config(), Arc::clone(&protocol));
        device.update(false).await.unwrap();
        protocol.respond_child("socket-2", "set_device_info", json!({}));

        device.child("socket-2").unwrap().turn_on().await.unwrap();

        let request = protocol.last_request().unwrap();
        assert_eq!(request.target().map(DeviceId::as_str), Some("socket-2"));
        assert!(Arc::ptr_eq(device.child("socket-2").unwrap().protocol(), &protocol));
    }

    #[tokio::test]
    async fn should_rebuild_children_on_renegotiation() {
        let protocol = Arc::new(strip_protocol());
        let mut device = SmartDevice::with_protocol(config(), Arc::clone(&protocol));
        device.update(false).await.unwrap();
        protocol.respond(
            "get_child_device_list",
            json!({"child_device_list": [{"device_id": "socket-1", "device_on": false}]}),
        );

        device.update(false).await.unwrap();
        assert_eq!(device.children().count(), 2);

        device.request_renegotiation();
        device.update(false).await.unwrap();
        assert_eq!(device.children().count(), 1);
    }

    #[tokio::test]
    async fn should_ignore_listed_child_that_is_not_attached() {
        let protocol = Arc::new(strip_protocol());
        let mut device = SmartDevice::with_protocol(config(), Arc::clone(&protocol));
        device.update(false).await.unwrap();
        protocol.respond(
            "get_child_device_list",
            json!({"child_device_list": [{"device_id": "socket-9", "device_on": true}]}),
        );

        device.update(false).await.unwrap();

        assert!(device.child("socket-9").is_none());
    }

    #[tokio::test]
    async fn should_fail_negotiation_when_child_listing_is_rejected() {
        let protocol = ScriptedProtocol::new();
        protocol.respond(
            "component_nego",
            crate::test_support::components(&["device", "child_device"]),
        );
        protocol.respond("get_device_info", json!({"device_id": "strip", "type": "SMART.TAPOPLUG"}));
        protocol.respond("get_connect_cloud_state", json!({"status": 0}));
        let mut device = SmartDevice::new(config(), protocol);

        let err = device.update(false).await.unwrap_err();

        assert!(err.is_device_reported());
        assert_eq!(device.phase(), SessionPhase::Uninitialized);
    }
}
