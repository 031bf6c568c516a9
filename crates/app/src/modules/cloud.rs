//! Cloud connectivity module.

use smartlink_domain::feature::{FeatureType, FeatureValue};
use smartlink_domain::message::Request;

use super::{Module, ModuleContext, ModuleError, ModuleKind};
use crate::features::{Container, Feature};

/// Tracks whether the device is connected to the vendor cloud.
///
/// A device that answers the cloud query with an error is simply treated as
/// disconnected; the module is not evicted for it.
#[derive(Debug, Clone, Default)]
pub struct Cloud {
    connected: bool,
}

impl Cloud {
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

impl Module for Cloud {
    fn query(&self) -> Request {
        Request::single("get_connect_cloud_state", None)
    }

    fn post_update(&mut self, ctx: &ModuleContext<'_>) -> Result<(), ModuleError> {
        self.connected = ctx
            .responses
            .payload("get_connect_cloud_state")
            .and_then(|state| state.get("status"))
            .and_then(serde_json::Value::as_i64)
            == Some(0);
        Ok(())
    }

    fn features(&self) -> Vec<Feature> {
        vec![
            Feature::new(
                "cloud_connection",
                "Cloud connection",
                Container::Module(ModuleKind::Cloud),
                |s| {
                    s.modules()
                        .cloud()
                        .map(|c| FeatureValue::Bool(c.is_connected()))
                },
            )
            .kind(FeatureType::BinarySensor)
            .icon("mdi:cloud"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use smartlink_domain::capability::CapabilitySet;
    use smartlink_domain::error::ErrorCode;
    use smartlink_domain::info::DeviceInfo;
    use smartlink_domain::message::{Response, Responses};

    use super::*;

    fn run(response: Option<Response>) -> Cloud {
        let info = DeviceInfo::default();
        let caps = CapabilitySet::default();
        let responses: Responses = response
            .into_iter()
            .map(|r| ("get_connect_cloud_state", r))
            .collect();
        let mut cloud = Cloud { connected: true };
        cloud
            .post_update(&ModuleContext {
                info: &info,
                responses: &responses,
                capabilities: &caps,
            })
            .unwrap();
        cloud
    }

    #[test]
    fn should_be_connected_when_status_is_zero() {
        assert!(run(Some(Response::Ok(json!({"status": 0})))).is_connected());
    }

    #[test]
    fn should_be_disconnected_for_non_zero_status() {
        assert!(!run(Some(Response::Ok(json!({"status": 1})))).is_connected());
    }

    #[test]
    fn should_tolerate_sentinel_as_disconnected() {
        assert!(!run(Some(Response::Err(ErrorCode::InternalQueryError))).is_connected());
        assert!(!run(None).is_connected());
    }
}
