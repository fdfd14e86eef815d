//! Session identifiers

use std::borrow::Borrow;

use super::error::RegistryError;

/// Caller-supplied identifier of one broadcast session.
///
/// The id doubles as the file stem of the session's overlay artifacts, so it
/// is restricted to 1-64 ASCII alphanumerics, `-`, `_` and `.`, and may not
/// start with a dot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Maximum id length in bytes
    pub const MAX_LEN: usize = 64;

    /// Validate and wrap a raw id
    pub fn parse(raw: impl Into<String>) -> Result<Self, RegistryError> {
        let raw = raw.into();

        if raw.is_empty() {
            return Err(RegistryError::InvalidId("must not be empty".into()));
        }
        if raw.len() > Self::MAX_LEN {
            return Err(RegistryError::InvalidId(format!(
                "too long ({} chars, max {})",
                raw.len(),
                Self::MAX_LEN
            )));
        }
        if raw.starts_with('.') {
            return Err(RegistryError::InvalidId("must not start with '.'".into()));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(RegistryError::InvalidId(format!(
                "contains invalid characters: {}",
                raw
            )));
        }

        Ok(Self(raw))
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}
