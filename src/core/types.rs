//! core::types
//!
//! Strong types for values that cross the wire.
//!
//! # Types
//!
//! - [`RefSpec`] - A `local:remote` reference pair used by push and pull
//! - [`TransactionId`] - Opaque server-issued transaction identifier
//!
//! # Validation
//!
//! These types enforce validity at construction time so malformed values
//! are rejected before a request is ever sent.
//!
//! # Examples
//!
//! ```
//! use geoconnect::core::types::{RefSpec, TransactionId};
//!
//! let spec = RefSpec::new("master:master").unwrap();
//! assert_eq!(spec.local(), "master");
//!
//! let id = TransactionId::new("7c6a7a8e-1a0b-4e5f").unwrap();
//! assert_eq!(id.as_str(), "7c6a7a8e-1a0b-4e5f");
//!
//! assert!(RefSpec::new("no-colon").is_err());
//! assert!(TransactionId::new("  ").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid ref spec: {0}")]
    InvalidRefSpec(String),

    #[error("invalid transaction id: {0}")]
    InvalidTransactionId(String),
}

/// A validated `local:remote` reference specification.
///
/// Both sides must be non-empty and free of whitespace. The value is sent
/// verbatim as the `ref` query parameter of push and pull.
///
/// # Example
///
/// ```
/// use geoconnect::core::types::RefSpec;
///
/// let spec = RefSpec::new("feature:refs/heads/feature").unwrap();
/// assert_eq!(spec.local(), "feature");
/// assert_eq!(spec.remote(), "refs/heads/feature");
/// assert_eq!(spec.to_string(), "feature:refs/heads/feature");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefSpec(String);

impl RefSpec {
    /// Create a new validated ref spec.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRefSpec` unless the value is exactly
    /// `local:remote` with both sides non-empty.
    pub fn new(spec: impl Into<String>) -> Result<Self, TypeError> {
        let spec = spec.into();
        Self::validate(&spec)?;
        Ok(Self(spec))
    }

    /// Build a ref spec that pushes or pulls a ref onto the same name.
    pub fn same(name: &str) -> Result<Self, TypeError> {
        Self::new(format!("{}:{}", name, name))
    }

    fn validate(spec: &str) -> Result<(), TypeError> {
        if spec.chars().any(|c| c.is_whitespace() || c.is_ascii_control()) {
            return Err(TypeError::InvalidRefSpec(format!(
                "'{}' contains whitespace",
                spec
            )));
        }
        match spec.split_once(':') {
            Some((local, remote))
                if !local.is_empty() && !remote.is_empty() && !remote.contains(':') =>
            {
                Ok(())
            }
            _ => Err(TypeError::InvalidRefSpec(format!(
                "'{}' is not of the form local:remote",
                spec
            ))),
        }
    }

    /// The local side of the ref spec.
    pub fn local(&self) -> &str {
        self.0.split_once(':').map(|(l, _)| l).unwrap_or(&self.0)
    }

    /// The remote side of the ref spec.
    pub fn remote(&self) -> &str {
        self.0.split_once(':').map(|(_, r)| r).unwrap_or(&self.0)
    }

    /// Get the ref spec as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RefSpec {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RefSpec> for String {
    fn from(spec: RefSpec) -> Self {
        spec.0
    }
}

impl std::fmt::Display for RefSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A server-issued transaction identifier.
///
/// The server decides the format; only emptiness is rejected here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionId(String);

impl TransactionId {
    /// Create a transaction id, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidTransactionId` if the id is blank.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(TypeError::InvalidTransactionId(
                "transaction id cannot be empty".into(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TransactionId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<TransactionId> for String {
    fn from(id: TransactionId) -> Self {
        id.0
    }
}

impl AsRef<str> for TransactionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod ref_spec {
        use super::*;

        #[test]
        fn valid_spec() {
            let spec = RefSpec::new("master:master").unwrap();
            assert_eq!(spec.local(), "master");
            assert_eq!(spec.remote(), "master");
        }

        #[test]
        fn same_builds_symmetric_spec() {
            let spec = RefSpec::same("develop").unwrap();
            assert_eq!(spec.as_str(), "develop:develop");
        }

        #[test]
        fn missing_colon_rejected() {
            assert!(matches!(
                RefSpec::new("master"),
                Err(TypeError::InvalidRefSpec(_))
            ));
        }

        #[test]
        fn empty_sides_rejected() {
            assert!(RefSpec::new(":master").is_err());
            assert!(RefSpec::new("master:").is_err());
            assert!(RefSpec::new(":").is_err());
        }

        #[test]
        fn extra_colon_rejected() {
            assert!(RefSpec::new("a:b:c").is_err());
        }

        #[test]
        fn whitespace_rejected() {
            assert!(RefSpec::new("my branch:master").is_err());
        }

        #[test]
        fn serde_roundtrip_validates() {
            let spec: RefSpec = serde_json::from_str("\"a:b\"").unwrap();
            assert_eq!(spec.remote(), "b");
            assert!(serde_json::from_str::<RefSpec>("\"ab\"").is_err());
        }
    }

    mod transaction_id {
        use super::*;

        #[test]
        fn trims_whitespace() {
            let id = TransactionId::new("  abc-123 \n").unwrap();
            assert_eq!(id.as_str(), "abc-123");
        }

        #[test]
        fn blank_rejected() {
            assert!(matches!(
                TransactionId::new(""),
                Err(TypeError::InvalidTransactionId(_))
            ));
        }

        #[test]
        fn display_matches_str() {
            let id = TransactionId::new("tx-1").unwrap();
            assert_eq!(format!("{}", id), "tx-1");
        }
    }
}
