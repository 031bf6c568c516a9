//! Child pairing module.

use serde::Deserialize;
use serde_json::Value;

use smartlink_domain::feature::{FeatureCategory, FeatureType};
use smartlink_domain::message::Request;

use super::{Module, ModuleContext, ModuleError, ModuleKind};
use crate::features::{Container, Feature, Setter};

/// Method listing the child categories a hub can pair.
pub const SUPPORTED_CATEGORIES_QUERY: &str = "get_support_child_device_category";

#[derive(Debug, Deserialize)]
struct CategoryList {
    #[serde(default)]
    device_category_list: Vec<Value>,
}

/// Pairing support for hubs.
#[derive(Debug, Clone, Default)]
pub struct ChildSetup {
    categories: Vec<Value>,
}

impl ChildSetup {
    /// Category entries as reported, echoed back as the scan filter.
    #[must_use]
    pub fn scan_list(&self) -> &[Value] {
        &self.categories
    }

    /// Names of the child categories the hub accepts.
    pub fn supported_categories(&self) -> impl Iterator<Item = &str> {
        self.categories
            .iter()
            .filter_map(|entry| entry.get("category").and_then(Value::as_str))
    }
}

impl Module for ChildSetup {
    fn query(&self) -> Request {
        Request::single(SUPPORTED_CATEGORIES_QUERY, None)
    }

    fn post_update(&mut self, ctx: &ModuleContext<'_>) -> Result<(), ModuleError> {
        let list: CategoryList = ctx.parse(SUPPORTED_CATEGORIES_QUERY)?;
        self.categories = list.device_category_list;
        Ok(())
    }

    fn features(&self) -> Vec<Feature> {
        vec![
            Feature::new("pair", "Pair", Container::Module(ModuleKind::ChildSetup), |_| None)
                .category(FeatureCategory::Config)
                .kind(FeatureType::Action)
                .icon("mdi:plus")
                .setter(Setter::Pair),
        ]
    }
}
