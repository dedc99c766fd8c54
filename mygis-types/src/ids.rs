//! Identifier types for portal content.
//!
//! Portal item and group ids are opaque strings (32 hex characters on
//! ArcGIS Online, free-form on some Enterprise deployments), so they are
//! validated only for shape, never for a particular alphabet.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

fn validate(value: &str) -> Result<(), Error> {
    if value.is_empty() {
        return Err(Error::InvalidId {
            value: value.to_string(),
            reason: "identifier is empty",
        });
    }
    if value.chars().any(|c| c.is_whitespace() || c == '/' || c == '?') {
        return Err(Error::InvalidId {
            value: value.to_string(),
            reason: "identifier contains whitespace or URL separators",
        });
    }
    Ok(())
}

/// Identifier of a portal item (e.g. a hosted feature service).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Parses an item id, rejecting empty values and values that would break
    /// a REST path.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let trimmed = s.trim();
        validate(trimmed)?;
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ItemId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for ItemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of a portal group (e.g. a collaboration workspace group).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    /// Parses a group id.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let trimmed = s.trim();
        validate(trimmed)?;
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for GroupId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for GroupId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
