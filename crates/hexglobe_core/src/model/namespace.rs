//! Application namespace ("mod") identity.
//!
//! # Invariants
//! - A `Namespace` is always safe to embed as one storage path segment.
//! - There is no implicit default namespace; callers pass one explicitly.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static NAMESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_.-]{0,63}$").expect("valid namespace regex"));

/// Validated namespace name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace(String);

impl Namespace {
    /// Parses and validates a namespace name.
    ///
    /// Accepted: lowercase ASCII letters, digits, `_`, `-`, `.`; must start
    /// with a letter or digit; at most 64 chars; no `..`.
    pub fn parse(raw: &str) -> Result<Self, NamespaceError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(NamespaceError::Empty);
        }
        if !NAMESPACE_RE.is_match(trimmed) || trimmed.contains("..") {
            return Err(NamespaceError::Invalid(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Namespace {
    type Error = NamespaceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Namespace> for String {
    fn from(value: Namespace) -> Self {
        value.0
    }
}

/// Namespace validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceError {
    Empty,
    Invalid(String),
}

impl Display for NamespaceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "namespace must not be empty"),
            Self::Invalid(value) => write!(
                f,
                "namespace `{value}` is invalid; expected [a-z0-9][a-z0-9_.-]{{0,63}}"
            ),
        }
    }
}

impl Error for NamespaceError {}
