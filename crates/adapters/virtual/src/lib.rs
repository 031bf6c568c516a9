//! # smartlink-adapter-virtual
//!
//! Virtual transport that answers the [`Protocol`] port from simulated
//! devices held in memory, for testing and demonstration.
//!
//! ## Provided devices
//!
//! | Device | Model | Children | Behaviour |
//! |--------|-------|----------|-----------|
//! | Virtual Plug | `P110` | — | Switchable, energy metering |
//! | Virtual Strip | `P300` | 3 sockets | Per-socket switching and metering |
//! | Virtual Hub | `H100` | sensors | Pairing scan finds one new contact sensor |
//! | Virtual Bulb | `L530` | — | Brightness, color, color temperature |
//!
//! ## Fault injection
//!
//! A [`VirtualProtocol`] can fail every multi-method batch, fail any call
//! containing a given method, or answer a method with a device-reported
//! error code.
//!
//! ## Dependency rule
//!
//! Depends on `smartlink-app` (port traits) and `smartlink-domain` only.

mod devices;

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;

use smartlink_app::ports::Protocol;
use smartlink_domain::error::{ErrorCode, TransportError};
use smartlink_domain::id::DeviceId;
use smartlink_domain::message::{Request, Response, Responses};

pub use devices::{DeviceKind, VirtualBulb, VirtualDevice, VirtualHub, VirtualPlug, VirtualStrip};

/// Delay reported when a batch is made to time out.
const BATCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct Faults {
    fail_batches: bool,
    failing: HashSet<String>,
    rejected: HashMap<String, ErrorCode>,
}

#[derive(Debug)]
struct Inner {
    device: VirtualDevice,
    faults: Faults,
    calls: usize,
}

/// In-memory protocol backed by one simulated device.
#[derive(Debug)]
pub struct VirtualProtocol {
    inner: Mutex<Inner>,
}

impl VirtualProtocol {
    /// Simulate a device of the given kind.
    #[must_use]
    pub fn new(kind: DeviceKind) -> Self {
        Self::with_device(VirtualDevice::new(kind))
    }

    /// Simulate an already-built device.
    #[must_use]
    pub fn with_device(device: VirtualDevice) -> Self {
        Self {
            inner: Mutex::new(Inner {
                device,
                faults: Faults::default(),
                calls: 0,
            }),
        }
    }

    /// Which kind of device is simulated.
    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        self.lock().device.kind()
    }

    /// Current info record of the device, or of one of its children.
    #[must_use]
    pub fn info(&self, child: Option<&str>) -> Option<Value> {
        self.lock().device.info(child)
    }

    /// Number of calls received so far, failed ones included.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.lock().calls
    }

    /// Make every call carrying more than one method time out.
    pub fn fail_batches(&self, fail: bool) {
        self.lock().faults.fail_batches = fail;
    }

    /// Make every call containing `method` fail at the transport level.
    pub fn fail_method(&self, method: &str) {
        self.lock().faults.failing.insert(method.to_owned());
    }

    /// Answer `method` with a device-reported error code.
    pub fn reject(&self, method: &str, code: ErrorCode) {
        self.lock().faults.rejected.insert(method.to_owned(), code);
    }

    /// Remove every injected fault.
    pub fn clear_faults(&self) {
        self.lock().faults = Faults::default();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn answer(&self, request: &Request) -> Result<Responses, TransportError> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.calls += 1;

        if inner.faults.fail_batches && request.len() > 1 {
            return Err(TransportError::Timeout(BATCH_TIMEOUT));
        }
        if let Some(method) = request.methods().find(|m| inner.faults.failing.contains(*m)) {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                format!("connection dropped while sending {method}"),
            )));
        }

        let target = request.target().map(DeviceId::as_str);
        let mut responses = Responses::new();
        for (method, params) in request.iter() {
            let response = match inner.faults.rejected.get(method) {
                Some(code) => Response::Err(*code),
                None => inner.device.handle(target, method, params),
            };
            responses.insert(method, response);
        }
        Ok(responses)
    }
}

impl Protocol for VirtualProtocol {
    async fn query(&self, request: Request) -> Result<Responses, TransportError> {
        tracing::trace!(
            device = %self.kind(),
            child = ?request.target(),
            methods = request.len(),
            "virtual query"
        );
        self.answer(&request)
    }
}
