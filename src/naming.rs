//! Identifier naming
//!
//! Local names derived from fully-qualified identifiers, and the allow-listed
//! label / relationship-type names that are the only text ever interpolated
//! into a statement.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

/// Returns the part of `identifier` after the last `#`, else after the last
/// `/`, else the identifier unchanged.
///
/// Two keys sharing a local name collapse into one property or relationship
/// type; keeping them distinct is the caller's job.
pub fn normalize(identifier: &str) -> &str {
    if let Some(i) = identifier.rfind('#') {
        return &identifier[i + 1..];
    }
    if let Some(i) = identifier.rfind('/') {
        return &identifier[i + 1..];
    }
    identifier
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,127}$").expect("name pattern is a valid regex")
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{name}' is not a valid {kind} name")]
pub struct NameError {
    pub kind: &'static str,
    pub name: String,
}

fn check(kind: &'static str, name: &str) -> Result<(), NameError> {
    if name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(NameError {
            kind,
            name: name.to_string(),
        })
    }
}

/// A node label that passed the allow-list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(String);

impl Label {
    pub fn parse(name: &str) -> Result<Self, NameError> {
        check("label", name)?;
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A relationship type that passed the allow-list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelationshipType(String);

impl RelationshipType {
    pub fn parse(name: &str) -> Result<Self, NameError> {
        check("relationship type", name)?;
        Ok(Self(name.to_string()))
    }

    /// Normalizes a reference key and validates the result.
    pub fn from_reference_key(key: &str) -> Result<Self, NameError> {
        Self::parse(normalize(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
