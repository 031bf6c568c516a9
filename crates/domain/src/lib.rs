//! # smartlink-domain
//!
//! Pure domain model for the smartlink device session manager.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define the **capability set** reported by component negotiation
//! - Define **device categories** and the classifier that derives them
//! - Define the **raw info record** and its derived read-only properties
//! - Define **requests and responses** exchanged with a device, including the
//!   in-band sentinel error codes
//! - Define **feature metadata** (categories, types, values)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod capability;
pub mod category;
pub mod credentials;
pub mod feature;
pub mod info;
pub mod message;
pub mod wifi;
