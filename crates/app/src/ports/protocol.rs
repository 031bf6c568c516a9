//! Protocol port: the transport used to exchange requests with a device.
//!
//! A protocol owns the session with one physical device (encryption, login,
//! retries). The session core hands it a [`Request`] and gets back a
//! [`Responses`] map, or a [`TransportError`] when the call as a whole
//! failed.

use std::future::Future;

use smartlink_domain::error::TransportError;
use smartlink_domain::message::{Request, Responses};

/// Request/response transport to a single physical device.
///
/// Implementations live in adapter crates (e.g. `adapter-virtual`).
///
/// # Contract
///
/// - Every method of a successful call has an entry in the returned map,
///   holding either a payload or an in-band error sentinel.
/// - A request with a [`target`](Request::target) is addressed to that child
///   of the device; the protocol wraps it in whatever envelope the device
///   needs.
/// - A transport-level failure (timeout, connection loss, undecodable
///   reply) fails the whole call.
pub trait Protocol: Send + Sync {
    /// Send a request and wait for the matching responses.
    fn query(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Responses, TransportError>> + Send;

    /// Release the underlying connection.
    fn close(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}
