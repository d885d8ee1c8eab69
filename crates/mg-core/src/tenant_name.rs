//! Strongly-typed tenant name wrapper.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

/// Strongly-typed wrapper for tenant names.
///
/// A tenant name doubles as the tenant's schema name and is spliced into
/// `CREATE SCHEMA` statements and schema placeholders, so only ASCII
/// letters, digits and underscores are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantName(String);

impl TenantName {
    /// Try to create a new `TenantName`, returning `None` if the name is empty
    /// or contains characters outside `[A-Za-z0-9_]`.
    pub fn try_new(name: impl Into<String>) -> Option<Self> {
        let s = name.into();
        if is_valid_tenant_name(&s) {
            Some(Self(s))
        } else {
            None
        }
    }

    /// Return the underlying name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper and return the inner `String`.
    pub fn into_inner(self) -> String {
        self.0
    }
}

fn is_valid_tenant_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for TenantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for TenantName {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TenantName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TenantName {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        if is_valid_tenant_name(&s) {
            Ok(Self(s))
        } else {
            Err(format!(
                "invalid tenant name '{s}': expected a non-empty name of [A-Za-z0-9_]"
            ))
        }
    }
}

impl TryFrom<&str> for TenantName {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::try_from(s.to_string())
    }
}

impl From<TenantName> for String {
    fn from(name: TenantName) -> Self {
        name.0
    }
}

impl PartialEq<str> for TenantName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for TenantName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl PartialEq<String> for TenantName {
    fn eq(&self, other: &String) -> bool {
        self.0 == *other
    }
}
