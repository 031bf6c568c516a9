//! Child enumeration module.

use serde::Deserialize;
use serde_json::Value;

use smartlink_domain::message::Request;

use super::{Module, ModuleContext, ModuleError};

#[derive(Debug, Deserialize)]
struct ChildList {
    child_device_list: Vec<Value>,
}

/// Fetches `get_child_device_list`; the parent uses it to refresh children.
#[derive(Debug, Clone, Default)]
pub struct ChildDevice {
    count: usize,
}

impl ChildDevice {
    /// Number of children in the last listing.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.count
    }
}

impl Module for ChildDevice {
    fn query(&self) -> Request {
        Request::single("get_child_device_list", None)
    }

    fn post_update(&mut self, ctx: &ModuleContext<'_>) -> Result<(), ModuleError> {
        let list: ChildList = ctx.parse("get_child_device_list")?;
        self.count = list.child_device_list.len();
        Ok(())
    }
}
