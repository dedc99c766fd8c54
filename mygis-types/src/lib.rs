//! Core type definitions for mygis.
//!
//! This crate defines the small, portal-agnostic vocabulary shared by the
//! comparison engine, the portal client and the CLI:
//! - Item and group identifiers
//! - Cross-portal layer keys (`LayerKey`)
//! - Comparison statuses and collection kinds
//! - Hashable attribute values used to build record multisets

mod ids;
mod layer_key;
mod status;
mod value;

pub use ids::{GroupId, ItemId};
pub use layer_key::{EphemeralToken, LayerKey};
pub use status::{CollectionKind, ComparisonStatus, EntryStatus};
pub use value::AttrValue;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid identifier {value:?}: {reason}")]
    InvalidId { value: String, reason: &'static str },

    #[error("unknown status: {0}")]
    UnknownStatus(String),
}
