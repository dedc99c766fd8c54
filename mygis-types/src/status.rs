//! Comparison statuses.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome of comparing one layer or table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Both sides agree.
    Ok,
    /// Both sides exist but disagree on data.
    Mismatch,
    /// Present on the host only (metadata and record comparison).
    MissingOnGuest,
    /// Present on the guest only (record comparison).
    MissingOnHost,
    /// Present on the guest only (metadata comparison).
    ExtraOnGuest,
    /// The layer could not be opened or queried.
    Error,
    /// Nothing comparable after field filtering.
    Skipped,
}

impl EntryStatus {
    /// Returns the wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Mismatch => "mismatch",
            Self::MissingOnGuest => "missing_on_guest",
            Self::MissingOnHost => "missing_on_host",
            Self::ExtraOnGuest => "extra_on_guest",
            Self::Error => "error",
            Self::Skipped => "skipped",
        }
    }

    /// Whether the entry describes presence on one side only.
    #[must_use]
    pub const fn is_one_sided(self) -> bool {
        matches!(
            self,
            Self::MissingOnGuest | Self::MissingOnHost | Self::ExtraOnGuest
        )
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(Self::Ok),
            "mismatch" => Ok(Self::Mismatch),
            "missing_on_guest" => Ok(Self::MissingOnGuest),
            "missing_on_host" => Ok(Self::MissingOnHost),
            "extra_on_guest" => Ok(Self::ExtraOnGuest),
            "error" => Ok(Self::Error),
            "skipped" => Ok(Self::Skipped),
            other => Err(Error::UnknownStatus(other.to_string())),
        }
    }
}

/// Outcome of comparing a whole item (or a whole record comparison).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStatus {
    Ok,
    Mismatch,
    Error,
}

impl ComparisonStatus {
    /// Returns the wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Mismatch => "mismatch",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ComparisonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which collection of a feature service an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Layers,
    Tables,
}

impl CollectionKind {
    /// Both kinds, in report order.
    pub const ALL: [CollectionKind; 2] = [CollectionKind::Layers, CollectionKind::Tables];

    /// Returns the wire name (`layers` / `tables`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Layers => "layers",
            Self::Tables => "tables",
        }
    }

    /// Singular noun used in human-readable output.
    #[must_use]
    pub const fn singular(self) -> &'static str {
        match self {
            Self::Layers => "layer",
            Self::Tables => "table",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
