//! Feature metadata and values.
//!
//! A feature is a named, typed, user-facing projection of device or module
//! state. The accessor/mutator plumbing lives in the app layer; this module
//! only defines the vocabulary.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::time::DeviceTime;

/// Where a feature is shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureCategory {
    Primary,
    Config,
    Info,
    Debug,
}

/// What kind of control or reading a feature is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    Sensor,
    BinarySensor,
    Switch,
    Action,
    Number,
    /// Composite values (e.g. an HSV triple).
    Unknown,
}

/// A single typed feature value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Time(DeviceTime),
    String(String),
    Json(serde_json::Value),
}

impl FeatureValue {
    /// Parse user input: booleans, integers, floats and JSON arrays/objects
    /// are recognised, anything else is kept as a string.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        match trimmed {
            "true" | "on" => return Self::Bool(true),
            "false" | "off" => return Self::Bool(false),
            _ => {}
        }
        if let Ok(int) = trimmed.parse::<i64>() {
            return Self::Int(int);
        }
        if let Ok(float) = trimmed.parse::<f64>() {
            return Self::Float(float);
        }
        if trimmed.starts_with('[') || trimmed.starts_with('{') {
            if let Ok(json) = serde_json::from_str(trimmed) {
                return Self::Json(json);
            }
        }
        Self::String(input.to_owned())
    }

    /// Boolean view of the value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Integer view of the value; floats must be whole.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// JSON view of the value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => b.fmt(f),
            Self::Int(i) => i.fmt(f),
            Self::Float(x) => x.fmt(f),
            Self::Time(t) => t.fmt(f),
            Self::String(s) => s.fmt(f),
            Self::Json(v) => v.fmt(f),
        }
    }
}

impl From<bool> for FeatureValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FeatureValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<String> for FeatureValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<DeviceTime> for FeatureValue {
    fn from(value: DeviceTime) -> Self {
        Self::Time(value)
    }
}
