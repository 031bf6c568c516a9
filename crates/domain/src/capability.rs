//! Capability set: the outcome of component negotiation.
//!
//! A device reports the functional components it supports together with a
//! version code. The set is produced once per negotiation and never mutated;
//! a new negotiation replaces it wholesale.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::ValidationError;
use crate::id::DeviceId;

/// Capability id that marks a device able to own children.
pub const CHILD_DEVICE: &str = "child_device";

#[derive(Debug, Deserialize)]
struct Component {
    id: String,
    ver_code: u32,
}

#[derive(Debug, Deserialize)]
struct ComponentList {
    component_list: Vec<Component>,
}

#[derive(Debug, Deserialize)]
struct ChildComponents {
    device_id: DeviceId,
    component_list: Vec<Component>,
}

#[derive(Debug, Deserialize)]
struct ChildComponentList {
    child_component_list: Vec<ChildComponents>,
}

/// Mapping from capability id to its negotiated version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet(BTreeMap<String, u32>);

impl CapabilitySet {
    /// Parse a `component_nego` payload (`{"component_list": [{"id", "ver_code"}]}`).
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Shape`] when the payload does not match.
    pub fn from_negotiation(payload: &serde_json::Value) -> Result<Self, ValidationError> {
        let list = ComponentList::deserialize(payload)
            .map_err(|_| ValidationError::Shape("component_nego"))?;
        Ok(collect_components(list.component_list))
    }

    /// Whether the capability is present, at any version.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    /// Negotiated version of a capability.
    #[must_use]
    pub fn version(&self, id: &str) -> Option<u32> {
        self.0.get(id).copied()
    }

    /// Iterate capability ids in lexical order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterate `(id, version)` pairs in lexical order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(id, ver)| (id.as_str(), *ver))
    }

    /// Number of capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no capability was negotiated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, u32)> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = (String, u32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<(&'a str, u32)> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = (&'a str, u32)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(id, ver)| (id.to_owned(), ver)).collect())
    }
}

fn collect_components(components: Vec<Component>) -> CapabilitySet {
    components.into_iter().map(|c| (c.id, c.ver_code)).collect()
}

/// Parse a `get_child_device_component_list` payload into per-child sets.
///
/// # Errors
///
/// Returns [`ValidationError::Shape`] when the payload does not match.
pub fn parse_child_capabilities(
    payload: &serde_json::Value,
) -> Result<BTreeMap<DeviceId, CapabilitySet>, ValidationError> {
    let list = ChildComponentList::deserialize(payload)
        .map_err(|_| ValidationError::Shape("get_child_device_component_list"))?;
    Ok(list
        .child_component_list
        .into_iter()
        .map(|child| (child.device_id, collect_components(child.component_list)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_negotiation_payload() {
        let payload = serde_json::json!({
            "component_list": [
                {"id": "device", "ver_code": 2},
                {"id": "child_device", "ver_code": 1},
            ]
        });
        let caps = CapabilitySet::from_negotiation(&payload).unwrap();
        assert_eq!(caps.len(), 2);
        assert!(caps.contains(CHILD_DEVICE));
        assert_eq!(caps.version("device"), Some(2));
        assert_eq!(caps.version("time"), None);
    }

    #[test]
    fn should_reject_malformed_negotiation_payload() {
        let payload = serde_json::json!({"components": []});
        let err = CapabilitySet::from_negotiation(&payload).unwrap_err();
        assert_eq!(err, ValidationError::Shape("component_nego"));
    }

    #[test]
    fn should_parse_child_component_list() {
        let payload = serde_json::json!({
            "child_component_list": [
                {"device_id": "c1", "component_list": [{"id": "device", "ver_code": 1}]},
                {"device_id": "c2", "component_list": []},
            ]
        });
        let children = parse_child_capabilities(&payload).unwrap();
        assert_eq!(children.len(), 2);
        let c1 = &children[&DeviceId::new("c1").unwrap()];
        assert!(c1.contains("device"));
        assert!(children[&DeviceId::new("c2").unwrap()].is_empty());
    }

    #[test]
    fn should_collect_from_str_pairs() {
        let caps: CapabilitySet = [("brightness", 1), ("color", 2)].into_iter().collect();
        assert_eq!(caps.ids().collect::<Vec<_>>(), vec!["brightness", "color"]);
    }
}
