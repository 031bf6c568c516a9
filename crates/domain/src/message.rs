//! Requests and responses exchanged with a device.
//!
//! A [`Request`] maps method names to optional parameters and keeps insertion
//! order, since batch composition order is significant. A [`Responses`] map
//! mirrors it: every submitted method has an entry holding either a payload
//! or an in-band [`ErrorCode`] sentinel.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::ErrorCode;
use crate::id::DeviceId;

/// Ordered mapping from method name to (nullable) parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    target: Option<DeviceId>,
    methods: Vec<(String, Option<Value>)>,
}

impl Request {
    /// Create an empty request addressed to the device itself.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a request holding a single method.
    #[must_use]
    pub fn single(method: impl Into<String>, params: Option<Value>) -> Self {
        let mut request = Self::new();
        request.insert(method, params);
        request
    }

    /// Address the request to a child of the device the transport talks to.
    #[must_use]
    pub fn with_target(mut self, target: Option<DeviceId>) -> Self {
        self.target = target;
        self
    }

    /// Child this request is addressed to, if any.
    #[must_use]
    pub fn target(&self) -> Option<&DeviceId> {
        self.target.as_ref()
    }

    /// Add a method, replacing the parameters in place if already present.
    pub fn insert(&mut self, method: impl Into<String>, params: Option<Value>) {
        let method = method.into();
        if let Some(slot) = self.methods.iter_mut().find(|(m, _)| *m == method) {
            slot.1 = params;
        } else {
            self.methods.push((method, params));
        }
    }

    /// Merge another request's methods into this one.
    pub fn extend(&mut self, other: Request) {
        for (method, params) in other.methods {
            self.insert(method, params);
        }
    }

    /// Whether the request contains the method.
    #[must_use]
    pub fn contains(&self, method: &str) -> bool {
        self.methods.iter().any(|(m, _)| m == method)
    }

    /// Parameters of a method.
    #[must_use]
    pub fn params(&self, method: &str) -> Option<&Value> {
        self.methods
            .iter()
            .find(|(m, _)| m == method)
            .and_then(|(_, p)| p.as_ref())
    }

    /// Iterate method names in insertion order.
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(|(m, _)| m.as_str())
    }

    /// Iterate `(method, params)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.methods.iter().map(|(m, p)| (m.as_str(), p.as_ref()))
    }

    /// Number of methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether the request holds no method.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Split into one single-method request per method, keeping the target.
    #[must_use]
    pub fn split(&self) -> Vec<Request> {
        self.methods
            .iter()
            .map(|(method, params)| {
                Request::single(method.clone(), params.clone()).with_target(self.target.clone())
            })
            .collect()
    }
}

impl<S: Into<String>> FromIterator<(S, Option<Value>)> for Request {
    fn from_iter<I: IntoIterator<Item = (S, Option<Value>)>>(iter: I) -> Self {
        let mut request = Self::new();
        for (method, params) in iter {
            request.insert(method, params);
        }
        request
    }
}

/// Outcome of one method inside a response.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// The method succeeded with this payload.
    Ok(Value),
    /// The method failed; the code is the in-band sentinel.
    Err(ErrorCode),
}

impl Response {
    /// Payload, treating a sentinel as absent.
    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        match self {
            Self::Ok(value) => Some(value),
            Self::Err(_) => None,
        }
    }

    /// Sentinel code, if the method failed.
    #[must_use]
    pub fn error(&self) -> Option<ErrorCode> {
        match self {
            Self::Ok(_) => None,
            Self::Err(code) => Some(*code),
        }
    }
}

/// Mapping from method name to its [`Response`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Responses(BTreeMap<String, Response>);

impl Responses {
    /// Create an empty response map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a method.
    pub fn insert(&mut self, method: impl Into<String>, response: Response) {
        self.0.insert(method.into(), response);
    }

    /// Merge another map in; entries replace existing ones wholesale per method.
    pub fn merge(&mut self, other: Responses) {
        self.0.extend(other.0);
    }

    /// Outcome of a method.
    #[must_use]
    pub fn get(&self, method: &str) -> Option<&Response> {
        self.0.get(method)
    }

    /// Payload of a method; a sentinel reads as absent.
    #[must_use]
    pub fn payload(&self, method: &str) -> Option<&Value> {
        self.0.get(method).and_then(Response::payload)
    }

    /// Take the outcome of a method out of the map.
    pub fn remove(&mut self, method: &str) -> Option<Response> {
        self.0.remove(method)
    }

    /// Whether the method has an entry (payload or sentinel).
    #[must_use]
    pub fn contains(&self, method: &str) -> bool {
        self.0.contains_key(method)
    }

    /// Iterate entries in method order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Response)> {
        self.0.iter().map(|(m, r)| (m.as_str(), r))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render as JSON, with sentinels shown as `{"error_code": n}`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let map = self
            .0
            .iter()
            .map(|(method, response)| {
                let value = match response {
                    Response::Ok(value) => value.clone(),
                    Response::Err(code) => serde_json::json!({"error_code": code.code()}),
                };
                (method.clone(), value)
            })
            .collect();
        Value::Object(map)
    }
}

impl<S: Into<String>> FromIterator<(S, Response)> for Responses {
    fn from_iter<I: IntoIterator<Item = (S, Response)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(m, r)| (m.into(), r)).collect())
    }
}
