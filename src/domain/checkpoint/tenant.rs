//! Tenant identity used to partition persisted state

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tenant used when the caller does not name one
pub const DEFAULT_TENANT: &str = "public";

/// Opaque tenant key; resolution from requests happens at the edges
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantKey(String);

impl TenantKey {
    /// Blank keys resolve to the default tenant
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        let trimmed = key.trim();

        if trimmed.is_empty() {
            Self::default()
        } else {
            Self(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identifier-safe form: lowercase ASCII alphanumerics with `_` for everything else
    pub fn sanitized(&self) -> String {
        self.0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl Default for TenantKey {
    fn default() -> Self {
        Self(DEFAULT_TENANT.to_string())
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TenantKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
