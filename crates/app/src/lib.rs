//! # smartlink-app
//!
//! Application layer: the device session core and its **port definitions**.
//!
//! ## Responsibilities
//! - Define the **port trait** that transport adapters implement:
//!   - `Protocol`: send a batched request to one physical device
//! - Drive a device session: capability negotiation, module loading, batched
//!   polling with per-method fallback, and post-update fault isolation
//! - Expose **features** (named, typed, optionally settable values) built from
//!   the intrinsic device properties and the loaded modules
//! - Build and refresh **child devices** (strip sockets, hub sensors) and run
//!   hub pairing sessions
//!
//! ## Dependency rule
//! Depends on `smartlink-domain` only (plus `tokio` for timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod config;
pub mod device;
pub mod features;
pub mod loader;
pub mod modules;
pub mod orchestrator;
pub mod pairing;
pub mod ports;
pub mod state;
pub mod topology;

#[cfg(test)]
mod test_support;

pub use config::DeviceConfig;
pub use device::{SessionPhase, SmartDevice};
pub use pairing::PairingOutcome;
pub use ports::Protocol;
