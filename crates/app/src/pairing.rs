//! Pairing: scanning for new children and attaching or detaching them.
//!
//! Neither pairing nor unpairing touches the child map; both request a
//! re-negotiation, which rebuilds it on the next update.

use std::time::Duration;

use serde::Serialize;
use serde_json::{Value, json};

use smartlink_domain::error::SmartError;
use smartlink_domain::id::DeviceId;

use crate::device::SmartDevice;
use crate::ports::Protocol;

/// Pause between two scan polls.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Devices attached by a successful pairing session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairingOutcome {
    /// Entries reported by the scan and submitted for adding.
    pub devices: Vec<Value>,
    /// The device's answer to the add request.
    pub response: Value,
}

impl<P: Protocol> SmartDevice<P> {
    /// Scan for new children and attach the first ones found.
    ///
    /// Returns `None` when nothing was detected before `timeout` (the
    /// configured pairing timeout when unset); no add request is sent then.
    ///
    /// # Errors
    ///
    /// Returns [`SmartError::Unsupported`] when the device cannot pair
    /// children, and the request error when any scan or add call fails.
    #[tracing::instrument(skip(self), fields(host = %self.state.host()))]
    pub async fn pair(&mut self, timeout: Option<Duration>) -> Result<Option<PairingOutcome>, SmartError> {
        let scan_list = self
            .state
            .modules()
            .child_setup()
            .map(|setup| setup.scan_list().to_vec())
            .ok_or(SmartError::Unsupported("ChildSetup"))?;
        let timeout = timeout.unwrap_or_else(|| self.config.pairing_timeout());

        self.query_helper("begin_scanning_child_device", None).await?;
        tracing::info!(?timeout, "scanning for child devices");

        let detected = match tokio::time::timeout(timeout, self.poll_detected(&scan_list)).await {
            Ok(detected) => detected?,
            Err(_) => {
                tracing::warn!(?timeout, "no devices found");
                return Ok(None);
            }
        };
        let devices = detected
            .get("child_device_list")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        tracing::info!(count = devices.len(), "discovery done");

        let response = self
            .query_helper("add_child_device_list", Some(detected))
            .await?;
        self.request_renegotiation();
        Ok(Some(PairingOutcome { devices, response }))
    }

    /// Poll the scan results until one lists at least one device.
    async fn poll_detected(&self, scan_list: &[Value]) -> Result<Value, SmartError> {
        loop {
            tokio::time::sleep(POLL_INTERVAL).await;
            let status = self
                .query_helper("get_scan_child_device_list", Some(json!({ "scan_list": scan_list })))
                .await?;
            tracing::debug!(%status, "scan status");
            let found = status
                .get("child_device_list")
                .and_then(Value::as_array)
                .is_some_and(|list| !list.is_empty());
            if found {
                return Ok(status);
            }
        }
    }

    /// Detach a child.
    ///
    /// # Errors
    ///
    /// Returns [`SmartError::Unsupported`] when the device cannot pair
    /// children, and the request error when the removal fails.
    #[tracing::instrument(skip(self), fields(host = %self.state.host()))]
    pub async fn unpair(&mut self, child_id: &DeviceId) -> Result<Value, SmartError> {
        if self.state.modules().child_setup().is_none() {
            return Err(SmartError::Unsupported("ChildSetup"));
        }
        let params = json!({ "child_device_list": [{ "device_id": child_id }] });
        let response = self
            .query_helper("remove_child_device_list", Some(params))
            .await?;
        tracing::info!(child = %child_id, "child removed");
        self.request_renegotiation();
        Ok(response)
    }
}
