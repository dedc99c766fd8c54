//! Cross-portal reconciliation of hosted feature services.
//!
//! Compares a host item with its collaborated copy on a guest portal:
//!
//! - [`identity`]: aligns layers and tables by [`LayerKey`](mygis_types::LayerKey)
//! - [`metadata`]: record counts and last-edit timestamps
//! - [`schema`]: comparable field sets and guest field resolution
//! - [`records`]: paged attribute multisets and their symmetric difference
//! - [`pairing`] and [`collab`]: matching items across collaboration groups
//!
//! Every comparison awaits its requests one after another. Comparisons
//! return payloads and never fail; problems surface as `error` statuses.

pub mod collab;
pub mod identity;
pub mod metadata;
mod open;
pub mod pairing;
pub mod records;
pub mod report;
pub mod schema;

pub use collab::{check_collaboration_groups, GroupOptions};
pub use identity::{keyed_layers, layer_key};
pub use metadata::{compare_items, last_edit_date, ItemComparison, ItemOptions, MetadataEntry};
pub use pairing::{origin_item_id, pair_group_items, pair_items, ItemPair, PairMatch};
pub use records::{
    compare_records, diff_records, fetch_multiset, RecordComparison, RecordDelta, RecordDiffRow,
    RecordEntry, RecordMultiset, RecordOptions,
};
pub use schema::{comparable_fields, reconcile_fields, MissingFields, ReconciledFields};
