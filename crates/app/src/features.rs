//! Features: named, typed views onto device or module state.
//!
//! A [`Feature`] pairs metadata with a getter reading the device state and,
//! optionally, a [`Setter`] turning a value into a request. Features never
//! hold a reference to the device; they are evaluated against a
//! [`DeviceState`] on demand.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::json;

use smartlink_domain::error::FeatureError;
use smartlink_domain::feature::{FeatureCategory, FeatureType, FeatureValue};
use smartlink_domain::message::Request;

use crate::modules::ModuleKind;
use crate::state::DeviceState;

/// Reads a feature value from device state.
pub type Getter = fn(&DeviceState) -> Option<FeatureValue>;

/// Builds the request that applies a feature value.
pub type RequestBuilder = fn(&DeviceState, &FeatureValue) -> Result<Request, FeatureError>;

/// How a feature value is applied.
#[derive(Clone, Copy)]
pub enum Setter {
    /// Send the built request to the device.
    Request(RequestBuilder),
    /// Start a pairing session on the device.
    Pair,
}

/// What contributed a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// Intrinsic to the device record.
    Device,
    /// Contributed by a module; removed with it.
    Module(ModuleKind),
}

/// A named, typed projection of device state.
#[derive(Clone)]
pub struct Feature {
    id: &'static str,
    name: &'static str,
    container: Container,
    category: FeatureCategory,
    kind: FeatureType,
    getter: Getter,
    setter: Option<Setter>,
    unit: Option<&'static str>,
    icon: Option<&'static str>,
    range: Option<(i64, i64)>,
}

impl Feature {
    /// Create a read-only informational sensor; refine with the builder methods.
    #[must_use]
    pub fn new(
        id: &'static str,
        name: &'static str,
        container: Container,
        getter: Getter,
    ) -> Self {
        Self {
            id,
            name,
            container,
            category: FeatureCategory::Info,
            kind: FeatureType::Sensor,
            getter,
            setter: None,
            unit: None,
            icon: None,
            range: None,
        }
    }

    #[must_use]
    pub fn category(mut self, category: FeatureCategory) -> Self {
        self.category = category;
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: FeatureType) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn setter(mut self, setter: Setter) -> Self {
        self.setter = Some(setter);
        self
    }

    #[must_use]
    pub fn unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    #[must_use]
    pub fn icon(mut self, icon: &'static str) -> Self {
        self.icon = Some(icon);
        self
    }

    #[must_use]
    pub fn range(mut self, min: i64, max: i64) -> Self {
        self.range = Some((min, max));
        self
    }

    #[must_use]
    pub fn id(&self) -> &'static str {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn container(&self) -> Container {
        self.container
    }

    #[must_use]
    pub fn feature_category(&self) -> FeatureCategory {
        self.category
    }

    #[must_use]
    pub fn feature_type(&self) -> FeatureType {
        self.kind
    }

    #[must_use]
    pub fn unit_of_measure(&self) -> Option<&'static str> {
        self.unit
    }

    #[must_use]
    pub fn icon_name(&self) -> Option<&'static str> {
        self.icon
    }

    #[must_use]
    pub fn value_range(&self) -> Option<(i64, i64)> {
        self.range
    }

    #[must_use]
    pub fn setter_kind(&self) -> Option<Setter> {
        self.setter
    }

    /// Whether the feature accepts writes.
    #[must_use]
    pub fn is_settable(&self) -> bool {
        self.setter.is_some()
    }

    /// Current value, read from device state.
    #[must_use]
    pub fn value(&self, state: &DeviceState) -> Option<FeatureValue> {
        (self.getter)(state)
    }

    /// Check a value against the feature's type and range.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::ReadOnly`] without a setter,
    /// [`FeatureError::InvalidValue`] for a value of the wrong type and
    /// [`FeatureError::OutOfRange`] for a number outside the range.
    pub fn validate(&self, value: &FeatureValue) -> Result<(), FeatureError> {
        if self.setter.is_none() {
            return Err(FeatureError::ReadOnly(self.id.to_owned()));
        }
        match self.kind {
            FeatureType::Switch => {
                value.as_bool().ok_or_else(|| FeatureError::InvalidValue {
                    id: self.id.to_owned(),
                    expected: "a boolean",
                })?;
            }
            FeatureType::Number => {
                let number = value.as_i64().ok_or_else(|| FeatureError::InvalidValue {
                    id: self.id.to_owned(),
                    expected: "an integer",
                })?;
                if let Some((min, max)) = self.range {
                    if !(min..=max).contains(&number) {
                        return Err(FeatureError::OutOfRange {
                            id: self.id.to_owned(),
                            min,
                            max,
                            value: number,
                        });
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl fmt::Debug for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feature")
            .field("id", &self.id)
            .field("container", &self.container)
            .field("category", &self.category)
            .field("kind", &self.kind)
            .field("settable", &self.is_settable())
            .field("range", &self.range)
            .finish_non_exhaustive()
    }
}

/// Features of one device, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    features: BTreeMap<&'static str, Feature>,
}

impl FeatureSet {
    /// Register a feature. On an id collision the later registration wins.
    pub fn add(&mut self, feature: Feature) {
        if let Some(previous) = self.features.insert(feature.id, feature) {
            tracing::warn!(feature = previous.id, "duplicate feature id, replacing");
        }
    }

    /// Drop every feature contributed by a module.
    pub fn remove_container(&mut self, kind: ModuleKind) {
        self.features
            .retain(|_, f| f.container != Container::Module(kind));
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Feature> {
        self.features.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.features.keys().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn clear(&mut self) {
        self.features.clear();
    }
}

pub(crate) fn set_device_info(params: serde_json::Value) -> Request {
    Request::single("set_device_info", Some(params))
}

fn expect_bool(id: &str, value: &FeatureValue) -> Result<bool, FeatureError> {
    value.as_bool().ok_or_else(|| FeatureError::InvalidValue {
        id: id.to_owned(),
        expected: "a boolean",
    })
}

/// Features every device exposes. All but `device_id` are gated on the
/// presence of their field, not on its value.
#[must_use]
pub fn device_features(state: &DeviceState) -> Vec<Feature> {
    let info = state.info();
    let mut features = Vec::new();
    features.push(
        Feature::new("device_id", "Device ID", Container::Device, |s| {
            s.device_id().map(|id| id.to_string().into())
        })
        .category(FeatureCategory::Debug),
    );
    if info.contains("device_on") {
        features.push(
            Feature::new("state", "State", Container::Device, |s| Some(s.is_on().into()))
                .category(FeatureCategory::Primary)
                .kind(FeatureType::Switch)
                .setter(Setter::Request(|_, value| {
                    let on = expect_bool("state", value)?;
                    Ok(set_device_info(json!({ "device_on": on })))
                })),
        );
    }
    if info.contains("signal_level") {
        features.push(
            Feature::new("signal_level", "Signal Level", Container::Device, |s| {
                s.info().signal_level().map(Into::into)
            })
            .icon("mdi:signal"),
        );
    }
    if info.contains("rssi") {
        features.push(
            Feature::new("rssi", "RSSI", Container::Device, |s| s.rssi().map(Into::into))
                .category(FeatureCategory::Debug)
                .unit("dBm")
                .icon("mdi:signal"),
        );
    }
    if info.contains("ssid") {
        features.push(
            Feature::new("ssid", "SSID", Container::Device, |s| Some(s.ssid().into()))
                .category(FeatureCategory::Debug)
                .icon("mdi:wifi"),
        );
    }
    if info.contains("overheated") {
        features.push(
            Feature::new("overheated", "Overheated", Container::Device, |s| {
                s.info().overheated().map(Into::into)
            })
            .kind(FeatureType::BinarySensor)
            .icon("mdi:heat-wave"),
        );
    }
    if info.contains("on_time") {
        features.push(
            Feature::new("on_since", "On since", Container::Device, |s| {
                s.on_since().map(Into::into)
            })
            .category(FeatureCategory::Debug)
            .icon("mdi:clock"),
        );
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::state_with_info;

    fn switch() -> Feature {
        Feature::new("state", "State", Container::Device, |s| Some(s.is_on().into()))
            .kind(FeatureType::Switch)
            .setter(Setter::Request(|_, _| Ok(Request::new())))
    }

    #[test]
    fn should_reject_writes_to_read_only_feature() {
        let feature = Feature::new("rssi", "RSSI", Container::Device, |_| None);
        assert_eq!(
            feature.validate(&FeatureValue::Int(1)),
            Err(FeatureError::ReadOnly("rssi".to_string()))
        );
    }

    #[test]
    fn should_reject_non_boolean_for_switch() {
        assert!(matches!(
            switch().validate(&FeatureValue::String("maybe".into())),
            Err(FeatureError::InvalidValue { .. })
        ));
    }

    #[test]
    fn should_reject_number_outside_range() {
        let feature = Feature::new("brightness", "Brightness", Container::Device, |_| None)
            .kind(FeatureType::Number)
            .range(1, 100)
            .setter(Setter::Request(|_, _| Ok(Request::new())));
        assert!(feature.validate(&FeatureValue::Int(100)).is_ok());
        assert!(matches!(
            feature.validate(&FeatureValue::Int(0)),
            Err(FeatureError::OutOfRange { min: 1, max: 100, value: 0, .. })
        ));
    }

    #[test]
    fn should_replace_feature_on_id_collision() {
        let mut set = FeatureSet::default();
        set.add(Feature::new("x", "First", Container::Device, |_| None));
        set.add(Feature::new("x", "Second", Container::Device, |_| None));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("x").map(Feature::name), Some("Second"));
    }

    #[test]
    fn should_remove_only_features_of_the_given_module() {
        let mut set = FeatureSet::default();
        set.add(Feature::new("a", "A", Container::Module(ModuleKind::Time), |_| None));
        set.add(Feature::new("b", "B", Container::Module(ModuleKind::Cloud), |_| None));
        set.add(Feature::new("c", "C", Container::Device, |_| None));
        set.remove_container(ModuleKind::Time);
        assert_eq!(set.ids().collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[test]
    fn should_gate_device_features_on_field_presence() {
        let state = state_with_info(json!({
            "device_id": "abc",
            "device_on": false,
            "rssi": -60,
        }));
        let ids: Vec<_> = device_features(&state).iter().map(Feature::id).collect();
        assert_eq!(ids, vec!["device_id", "state", "rssi"]);
    }

    #[test]
    fn should_read_falsy_state_value() {
        let state = state_with_info(json!({"device_on": false}));
        let features = device_features(&state);
        let state_feature = features.iter().find(|f| f.id() == "state");
        assert_eq!(
            state_feature.and_then(|f| f.value(&state)),
            Some(FeatureValue::Bool(false))
        );
    }
}
