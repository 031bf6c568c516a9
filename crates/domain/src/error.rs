//! Common error types used across the workspace.
//!
//! [`SmartError`] is the single user-visible error. It separates "you are not
//! authenticated" from "the device rejected this specific request" from "the
//! device could not be reached". Per-field failures inside an otherwise
//! successful response are not errors at all: they travel in-band as an
//! [`ErrorCode`] sentinel (see [`crate::message::Response`]).

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// In-band error code attached to a single method of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum ErrorCode {
    /// Client-side sentinel: the method could not be queried, even on its own.
    InternalQueryError,
    /// The device failed without giving a reason.
    Unspecific,
    /// The device does not know the requested method.
    UnknownMethod,
    /// The device could not decode the request.
    JsonDecode,
    /// The device rejected the request parameters.
    InvalidParameters,
    /// The device refused the session credentials.
    LoginFailed,
    /// Any other device-reported code.
    Other(i64),
}

impl ErrorCode {
    /// Numeric code as used on the wire.
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            Self::InternalQueryError => -100_000,
            Self::Unspecific => -1001,
            Self::UnknownMethod => -1002,
            Self::JsonDecode => -1003,
            Self::InvalidParameters => -1008,
            Self::LoginFailed => -1501,
            Self::Other(code) => code,
        }
    }

    /// Whether this code was produced locally rather than by the device.
    #[must_use]
    pub fn is_client_side(self) -> bool {
        matches!(self, Self::InternalQueryError)
    }
}

impl From<i64> for ErrorCode {
    fn from(code: i64) -> Self {
        match code {
            -100_000 => Self::InternalQueryError,
            -1001 => Self::Unspecific,
            -1002 => Self::UnknownMethod,
            -1003 => Self::JsonDecode,
            -1008 => Self::InvalidParameters,
            -1501 => Self::LoginFailed,
            other => Self::Other(other),
        }
    }
}

impl From<ErrorCode> for i64 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InternalQueryError => "internal query error",
            Self::Unspecific => "unspecific error",
            Self::UnknownMethod => "unknown method",
            Self::JsonDecode => "request could not be decoded",
            Self::InvalidParameters => "invalid parameters",
            Self::LoginFailed => "login failed",
            Self::Other(_) => "device error",
        };
        write!(f, "{name} ({})", self.code())
    }
}

/// Failure of a whole call at the transport level.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No response arrived within the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The connection could not be established or broke mid-request.
    #[error("connection failed")]
    Io(#[from] std::io::Error),

    /// The device answered with something the codec could not decode.
    #[error("malformed response")]
    Decode(#[source] serde_json::Error),
}

/// Validation failures for domain values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// An identifier was empty.
    #[error("identifier must not be empty")]
    EmptyId,
    /// A payload did not have the expected shape.
    #[error("unexpected payload shape for {0}")]
    Shape(&'static str),
}

/// Failures reading or writing a feature.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeatureError {
    /// No feature with this id exists on the device.
    #[error("unknown feature {0}")]
    Unknown(String),

    /// The feature has no mutator.
    #[error("feature {0} is read-only")]
    ReadOnly(String),

    /// The supplied value has the wrong type.
    #[error("feature {id} expects {expected}")]
    InvalidValue {
        /// Feature id.
        id: String,
        /// Human-readable description of the accepted value.
        expected: &'static str,
    },

    /// The supplied value is outside the accepted range.
    #[error("feature {id} accepts {min}..={max}, got {value}")]
    OutOfRange {
        /// Feature id.
        id: String,
        /// Lower bound (inclusive).
        min: i64,
        /// Upper bound (inclusive).
        max: i64,
        /// Rejected value.
        value: i64,
    },
}

/// Error surfaced to callers of the device-facing API.
#[derive(Debug, thiserror::Error)]
pub enum SmartError {
    /// Credentials are entirely missing.
    #[error("device requires authentication")]
    Authentication,

    /// The device explicitly rejected a request.
    #[error("device rejected {method}: {code}")]
    Device {
        /// Method that was rejected.
        method: String,
        /// Code reported by the device.
        code: ErrorCode,
    },

    /// The device could not be reached.
    #[error("device could not be reached")]
    Transport(#[from] TransportError),

    /// A response lacked a method the request asked for.
    #[error("{method} missing from response")]
    MissingResponse {
        /// Method with no usable payload.
        method: String,
    },

    /// A payload could not be interpreted.
    #[error("malformed {method} payload")]
    Payload {
        /// Method whose payload was malformed.
        method: String,
        /// Underlying decode failure.
        #[source]
        source: serde_json::Error,
    },

    /// The operation needs a module the device does not provide.
    #[error("device does not support {0}")]
    Unsupported(&'static str),

    /// No child with this id is attached.
    #[error("no child device {0}")]
    UnknownChild(String),

    /// Feature access failed.
    #[error("feature error")]
    Feature(#[from] FeatureError),

    /// A domain value failed validation.
    #[error("validation error")]
    Validation(#[from] ValidationError),
}

impl SmartError {
    /// Whether the far end explicitly rejected the request.
    #[must_use]
    pub fn is_device_reported(&self) -> bool {
        matches!(self, Self::Device { .. })
    }
}
