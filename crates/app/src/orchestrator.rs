//! Update orchestrator — the per-device control loop.
//!
//! One call to [`SmartDevice::update`] walks the session state machine
//! (`Uninitialized → Negotiated → Ready`), issues one batched request for
//! every module that is due, degrades to per-method requests when the batch
//! fails, runs post-update hooks with eviction, and fans the results out to
//! children.

use std::sync::OnceLock;

use serde_json::Value;

use smartlink_domain::capability::{CHILD_DEVICE, CapabilitySet};
use smartlink_domain::category::DeviceCategory;
use smartlink_domain::error::{ErrorCode, SmartError};
use smartlink_domain::info::DeviceInfo;
use smartlink_domain::message::{Request, Response, Responses};
use smartlink_domain::time::{Timestamp, now};

use crate::device::{SessionPhase, SmartDevice};
use crate::features::{FeatureSet, device_features};
use crate::loader::load_modules;
use crate::modules::{MODULE_DESCRIPTORS, ModuleContext, ModuleKind};
use crate::ports::Protocol;
use crate::state::DeviceState;

/// Methods fetched together during negotiation.
const NEGOTIATION_METHODS: [&str; 3] = ["component_nego", "get_device_info", "get_connect_cloud_state"];

impl<P: Protocol> SmartDevice<P> {
    /// Refresh the device.
    ///
    /// Negotiates first when needed, then polls every due module once. Hubs
    /// only refresh their children's modules when `update_children` is set;
    /// other parents always do. Child info is refreshed from the parent's
    /// child listing in every case.
    ///
    /// # Errors
    ///
    /// Returns [`SmartError::Authentication`] without any credentials, and
    /// the negotiation failure when negotiation could not complete. Failures
    /// during polling never surface here: they turn into sentinels and
    /// module evictions.
    pub async fn update(&mut self, update_children: bool) -> Result<(), SmartError> {
        self.update_at(now(), update_children).await
    }

    #[tracing::instrument(skip(self), fields(host = %self.state.host()))]
    pub(crate) async fn update_at(&mut self, now: Timestamp, update_children: bool) -> Result<(), SmartError> {
        if !self.config.has_credentials() {
            return Err(SmartError::Authentication);
        }
        if self.state.is_child() {
            self.refresh_as_child(now).await;
            return Ok(());
        }
        if self.phase == SessionPhase::Uninitialized {
            self.negotiate().await?;
        }
        let first_update = self.phase == SessionPhase::Negotiated;
        self.last_update_time = Some(now);

        let responses = self.update_modules(now, first_update).await;
        if let Some(info) = responses.payload("get_device_info") {
            self.state.info = DeviceInfo::from_value(info.clone());
        }
        run_post_update_hooks(&mut self.state, &mut self.features);

        if update_children || self.state.category() != DeviceCategory::Hub {
            for child in self.children.values_mut() {
                child.update_modules(now, false).await;
            }
        }
        self.push_child_info();

        let parent = self.parent_ref();
        for child in self.children.values_mut() {
            child.state.parent = Some(parent.clone());
            run_post_update_hooks(&mut child.state, &mut child.features);
        }

        self.phase = SessionPhase::Ready;
        if self.features.is_empty() {
            self.initialize_features();
        }

        tracing::debug!(
            modules = self.state.modules().len(),
            children = self.children.len(),
            features = self.features.len(),
            "update completed"
        );
        Ok(())
    }

    /// Single round trip fetching capabilities, info and cloud state, then
    /// children and modules.
    async fn negotiate(&mut self) -> Result<(), SmartError> {
        let request: Request = NEGOTIATION_METHODS.iter().map(|m| (*m, None)).collect();
        let responses = self.protocol.query(request).await?;

        let capabilities = CapabilitySet::from_negotiation(negotiated(&responses, "component_nego")?)?;
        let info = negotiated(&responses, "get_device_info")?.clone();

        self.state.capabilities = capabilities;
        self.state.info = DeviceInfo::from_value(info);
        self.state.last_update = responses;
        self.state.category = OnceLock::new();
        self.children.clear();
        self.features.clear();

        let category = self.state.category();
        if self.state.capabilities.contains(CHILD_DEVICE) && self.children.is_empty() {
            self.initialize_children().await?;
        }
        self.state.modules = load_modules(&self.state, MODULE_DESCRIPTORS).await;
        self.phase = SessionPhase::Negotiated;

        tracing::info!(
            %category,
            capabilities = self.state.capabilities.len(),
            modules = self.state.modules().len(),
            children = self.children.len(),
            "device negotiated"
        );
        Ok(())
    }

    /// Batch every due module of this device, merge the answer into the
    /// last-known responses and return this cycle's responses.
    ///
    /// On the first cycle after negotiation the bootstrap modules are marked
    /// updated without being queried.
    pub(crate) async fn update_modules(&mut self, now: Timestamp, first_update: bool) -> Responses {
        let mut request = Request::new().with_target(self.state.target());
        let mut queried = Vec::new();
        for entry in self.state.modules.iter_mut() {
            let fragment = entry.module().query();
            if fragment.is_empty() {
                continue;
            }
            if first_update && entry.kind().is_bootstrap() {
                entry.mark_updated(now);
                continue;
            }
            if entry.is_due(now) {
                queried.push(entry.kind());
                request.extend(fragment);
            }
        }

        tracing::debug!(
            host = %self.state.host(),
            child = ?self.state.target(),
            modules = ?queried,
            "querying modules"
        );
        let responses = self.execute(request).await;
        self.state.last_update.merge(responses.clone());
        for entry in self.state.modules.iter_mut() {
            if queried.contains(&entry.kind()) {
                entry.mark_updated(now);
            }
        }
        responses
    }

    /// Send a batch; on failure replay every method on its own, turning each
    /// individual failure into an internal-query-error sentinel.
    async fn execute(&self, request: Request) -> Responses {
        if request.is_empty() {
            return Responses::new();
        }
        let error = match self.protocol.query(request.clone()).await {
            Ok(responses) => return responses,
            Err(error) => error,
        };
        tracing::warn!(
            host = %self.state.host(),
            %error,
            methods = request.len(),
            "batched query failed, querying methods one by one"
        );

        let mut responses = Responses::new();
        for single in request.split() {
            let Some(method) = single.methods().next().map(str::to_owned) else {
                continue;
            };
            match self.protocol.query(single).await {
                Ok(mut answer) => {
                    let response = answer
                        .remove(&method)
                        .unwrap_or(Response::Err(ErrorCode::InternalQueryError));
                    responses.insert(method, response);
                }
                Err(error) => {
                    tracing::error!(host = %self.state.host(), %error, method, "query failed");
                    responses.insert(method, Response::Err(ErrorCode::InternalQueryError));
                }
            }
        }
        responses
    }

    /// Refresh of a child driven on its own: modules only, info stays as the
    /// parent last pushed it.
    async fn refresh_as_child(&mut self, now: Timestamp) {
        self.update_modules(now, false).await;
        run_post_update_hooks(&mut self.state, &mut self.features);
        self.last_update_time = Some(now);
        if self.features.is_empty() {
            self.initialize_features();
        }
    }

    /// Build the feature set of this device and of every child.
    fn initialize_features(&mut self) {
        let mut features = FeatureSet::default();
        for feature in device_features(&self.state) {
            features.add(feature);
        }
        for entry in self.state.modules().iter() {
            for feature in entry.module().features() {
                features.add(feature);
            }
        }
        self.features = features;
        for child in self.children.values_mut() {
            child.initialize_features();
        }
    }
}

/// Payload of a negotiation method; a rejected login reads as missing
/// credentials.
fn negotiated<'a>(responses: &'a Responses, method: &str) -> Result<&'a Value, SmartError> {
    match responses.get(method) {
        Some(Response::Ok(value)) => Ok(value),
        Some(Response::Err(ErrorCode::LoginFailed)) => Err(SmartError::Authentication),
        Some(Response::Err(code)) => Err(SmartError::Device {
            method: method.to_owned(),
            code: *code,
        }),
        None => Err(SmartError::MissingResponse {
            method: method.to_owned(),
        }),
    }
}

/// Run every module's post-update hook and evict the modules that fail,
/// together with their features.
///
/// Modules with a query that was never sent have nothing to process yet and
/// are left alone.
pub(crate) fn run_post_update_hooks(state: &mut DeviceState, features: &mut FeatureSet) {
    let ctx = ModuleContext {
        info: &state.info,
        responses: &state.last_update,
        capabilities: &state.capabilities,
    };
    let mut failed: Vec<ModuleKind> = Vec::new();
    for entry in state.modules.iter_mut() {
        if entry.last_update().is_none() && !entry.module().query().is_empty() {
            continue;
        }
        if let Err(error) = entry.module_mut().post_update(&ctx) {
            tracing::warn!(
                host = %state.host,
                child = ?state.child_id,
                module = %entry.kind(),
                %error,
                "module failed to process update and will be unavailable"
            );
            failed.push(entry.kind());
        }
    }
    for kind in failed {
        state.modules.remove(kind);
        features.remove_container(kind);
    }
}
