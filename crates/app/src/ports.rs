//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the device session core and the outside
//! world. They are defined here (in `app`) so that both the session layer and
//! the transport adapters can depend on them without circular dependencies.

pub mod protocol;

pub use protocol::Protocol;
