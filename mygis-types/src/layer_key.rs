//! Cross-portal identity of a layer or table.
//!
//! A collaboration copies a feature service from one portal to another, so
//! the only things two copies share are the declared layer name and (usually)
//! the numeric layer id. `LayerKey` captures which of those was available.

use serde::{Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// Process-local token for layers that expose neither a name nor an id.
///
/// Unique within one run; meaningless in any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EphemeralToken(Uuid);

impl EphemeralToken {
    /// Creates a new token.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for EphemeralToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EphemeralToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Key used to align layers and tables between a host and a guest service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LayerKey {
    /// The layer's declared name.
    Named(String),
    /// The layer's numeric id within its service.
    Indexed(i64),
    /// Neither name nor id was readable. Never equal across runs.
    Ephemeral(EphemeralToken),
}

impl LayerKey {
    /// Creates a fresh ephemeral key.
    #[must_use]
    pub fn ephemeral() -> Self {
        Self::Ephemeral(EphemeralToken::new())
    }

    /// Parses a user-supplied key selector: `id:<n>` selects by id, anything
    /// else by name. Ephemeral keys cannot be written down.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix("id:") {
            if let Ok(id) = rest.trim().parse::<i64>() {
                return Self::Indexed(id);
            }
        }
        Self::Named(s.to_string())
    }

    /// Whether the key identifies the same layer across runs and portals.
    #[must_use]
    pub fn is_stable(&self) -> bool {
        !matches!(self, Self::Ephemeral(_))
    }

    /// Case-insensitive match against a rendered selector.
    #[must_use]
    pub fn matches(&self, selector: &str) -> bool {
        self.to_string().eq_ignore_ascii_case(selector.trim())
    }
}

impl fmt::Display for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Indexed(id) => write!(f, "id:{id}"),
            Self::Ephemeral(token) => write!(f, "ephemeral:{token}"),
        }
    }
}

impl Serialize for LayerKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
