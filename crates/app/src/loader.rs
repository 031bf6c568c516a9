//! Module loader — decides which modules a device gets.

use crate::modules::{Light, ModuleDescriptor, ModuleSet, SmartModule};
use crate::state::DeviceState;

/// Instantiate every eligible module for a device.
///
/// A descriptor is skipped when it is root-only and the device sits under a
/// parent that is not a hub, or when the device neither negotiated the
/// capability nor reports the descriptor's parent key. Surviving candidates
/// must pass their runtime probe. The composite light is added last when
/// any colour-related module was loaded.
#[tracing::instrument(skip_all, fields(host = %state.host(), child = ?state.target()))]
pub async fn load_modules(state: &DeviceState, descriptors: &[ModuleDescriptor]) -> ModuleSet {
    let ctx = state.module_context();
    let under_non_hub = state.parent().is_some_and(|parent| !parent.is_hub());
    let mut modules = ModuleSet::default();

    for descriptor in descriptors {
        if descriptor.root_only && under_non_hub {
            continue;
        }
        let has_capability = state.capabilities().contains(descriptor.capability);
        let has_parent_key = descriptor
            .parent_key
            .is_some_and(|key| state.info().contains(key));
        if !has_capability && !has_parent_key {
            continue;
        }
        let module = (descriptor.constructor)();
        if module.check_supported(&ctx).await {
            modules.insert(module);
        } else {
            tracing::debug!(module = %descriptor.kind, "module not supported by device");
        }
    }

    if let Some(light) = Light::from_modules(&modules) {
        modules.insert(SmartModule::Light(light));
    }

    tracing::debug!(count = modules.len(), "modules loaded");
    modules
}
