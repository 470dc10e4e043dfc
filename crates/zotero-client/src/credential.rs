//! API key handling
//!
//! The raw key is only reachable through [`ApiKey::expose`]. `Debug` and
//! [`ApiKey::masked`] show a four-character prefix followed by `****`, and
//! [`ApiKey::redact`] scrubs the key out of arbitrary text (error messages,
//! log lines) before it is shown to anyone.

use std::fmt;

use serde::Deserialize;

const VISIBLE_PREFIX: usize = 4;
const MASK: &str = "****";

#[derive(Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into().trim().to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Prefix plus mask. Keys too short to keep a prefix are masked entirely.
    pub fn masked(&self) -> String {
        if self.0.chars().count() <= VISIBLE_PREFIX {
            return MASK.to_string();
        }
        let prefix: String = self.0.chars().take(VISIBLE_PREFIX).collect();
        format!("{}{}", prefix, MASK)
    }

    /// Replace every occurrence of the key in `text` with [`ApiKey::masked`].
    pub fn redact(&self, text: &str) -> String {
        if self.0.is_empty() {
            return text.to_string();
        }
        text.replace(&self.0, &self.masked())
    }
}

impl From<String> for ApiKey {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

impl From<&str> for ApiKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey({})", self.masked())
    }
}
