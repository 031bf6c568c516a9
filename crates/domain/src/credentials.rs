//! Credentials used to authenticate against a device.

use std::fmt;

use serde::Deserialize;

/// Username/password pair.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    /// Account name (usually an e-mail address).
    pub username: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Build a credential pair.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
