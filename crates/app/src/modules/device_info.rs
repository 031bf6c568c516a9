//! Base device information module.

use serde_json::Value;

use smartlink_domain::message::Request;

use super::{Module, ModuleContext, ModuleError};

/// Fetches `get_device_info`, the raw info record.
#[derive(Debug, Clone, Default)]
pub struct DeviceModule {
    fields: usize,
}

impl DeviceModule {
    /// Number of fields in the last info record.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields
    }
}

impl Module for DeviceModule {
    fn query(&self) -> Request {
        Request::single("get_device_info", None)
    }

    fn post_update(&mut self, ctx: &ModuleContext<'_>) -> Result<(), ModuleError> {
        match ctx.payload("get_device_info")? {
            Value::Object(map) => {
                self.fields = map.len();
                Ok(())
            }
            _ => Err(ModuleError::MissingField("get_device_info")),
        }
    }
}
