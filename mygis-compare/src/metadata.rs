//! Metadata comparison: record counts and last-edit timestamps per layer.

use crate::identity::{entry_name, find, keyed_layers};
use crate::open::open_pair;
use mygis_portal::service::value_as_i64;
use mygis_portal::{LayerInfo, LayerProperties, Portal, ServiceInfo};
use mygis_types::{CollectionKind, ComparisonStatus, EntryStatus, LayerKey};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

/// Where clause used for count-only queries.
pub const COUNT_ALL: &str = "1=1";

/// Options for [`compare_items`].
#[derive(Debug, Clone)]
pub struct ItemOptions {
    /// Log the per-item summary at info level (debug otherwise).
    pub verbose: bool,
}

impl Default for ItemOptions {
    fn default() -> Self {
        Self { verbose: true }
    }
}

/// Agreement flags carried by entries that exist on both sides.
///
/// Each flag is `None` when either side's value is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchFlags {
    pub count_match: Option<bool>,
    pub timestamp_match: Option<bool>,
}

/// Metadata comparison of one layer or table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataEntry {
    pub kind: CollectionKind,
    pub key: LayerKey,
    pub name: String,
    pub status: EntryStatus,
    pub host_count: Option<u64>,
    pub guest_count: Option<u64>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub matches: Option<MatchFlags>,
    pub host_last_edit: Option<i64>,
    pub guest_last_edit: Option<i64>,
}

/// Result of comparing one host item with one guest item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemComparison {
    pub status: ComparisonStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub host_item_id: String,
    pub guest_item_id: String,
    pub title: Option<String>,
    pub host_url: Option<String>,
    pub guest_url: Option<String>,
    pub layers: Vec<MetadataEntry>,
    pub tables: Vec<MetadataEntry>,
}

impl ItemComparison {
    fn failed(host_item_id: &str, guest_item_id: &str, message: String) -> Self {
        Self {
            status: ComparisonStatus::Error,
            message: Some(message),
            host_item_id: host_item_id.to_string(),
            guest_item_id: guest_item_id.to_string(),
            title: None,
            host_url: None,
            guest_url: None,
            layers: Vec::new(),
            tables: Vec::new(),
        }
    }

    /// Entries of both collections, layers first.
    pub fn entries(&self) -> impl Iterator<Item = &MetadataEntry> {
        self.layers.iter().chain(self.tables.iter())
    }
}

/// Best-effort last-edit timestamp (epoch milliseconds as reported).
///
/// Looks at `editingInfo.lastEditDate`, `editingInfo.last_edit_date` (also
/// under `editinginfo`), then top-level `lastEditDate` and `updateDate`.
pub fn last_edit_date(properties: &LayerProperties) -> Option<i64> {
    let editing = properties
        .get("editingInfo")
        .or_else(|| properties.get("editinginfo"))
        .and_then(Value::as_object);

    editing
        .and_then(|info| {
            ["lastEditDate", "last_edit_date"]
                .iter()
                .find_map(|k| info.get(*k).and_then(value_as_i64))
        })
        .or_else(|| properties.get_i64("lastEditDate"))
        .or_else(|| properties.get_i64("updateDate"))
}

/// Count-only query; failures degrade to `None`.
pub(crate) async fn safe_count(portal: &dyn Portal, layer: &LayerInfo) -> Option<u64> {
    match portal.query_count(layer, COUNT_ALL).await {
        Ok(count) => Some(count),
        Err(e) => {
            debug!(url = %layer.url, error = %e, "Count query failed");
            None
        }
    }
}

/// Metadata status of a matched pair.
///
/// `Ok` iff the counts are equal and the timestamps are equal or either is
/// unknown.
pub fn metadata_status(
    host_count: Option<u64>,
    guest_count: Option<u64>,
    host_last_edit: Option<i64>,
    guest_last_edit: Option<i64>,
) -> EntryStatus {
    let timestamps_agree = match (host_last_edit, guest_last_edit) {
        (Some(h), Some(g)) => h == g,
        _ => true,
    };
    if host_count == guest_count && timestamps_agree {
        EntryStatus::Ok
    } else {
        EntryStatus::Mismatch
    }
}

fn both_known<T: PartialEq>(a: Option<T>, b: Option<T>) -> Option<bool> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a == b),
        _ => None,
    }
}

async fn compare_collection(
    kind: CollectionKind,
    host: &dyn Portal,
    host_service: &ServiceInfo,
    guest: &dyn Portal,
    guest_service: &ServiceInfo,
) -> Vec<MetadataEntry> {
    let host_keyed = keyed_layers(host_service.collection(kind));
    let guest_keyed = keyed_layers(guest_service.collection(kind));
    let mut entries = Vec::new();

    for (key, host_layer) in &host_keyed {
        let host_count = safe_count(host, host_layer).await;
        let host_last_edit = last_edit_date(&host_layer.properties);

        let Some(guest_layer) = find(&guest_keyed, key) else {
            entries.push(MetadataEntry {
                kind,
                key: key.clone(),
                name: entry_name(key, host_layer),
                status: EntryStatus::MissingOnGuest,
                host_count,
                guest_count: None,
                matches: None,
                host_last_edit,
                guest_last_edit: None,
            });
            continue;
        };

        let guest_count = safe_count(guest, guest_layer).await;
        let guest_last_edit = last_edit_date(&guest_layer.properties);
        entries.push(MetadataEntry {
            kind,
            key: key.clone(),
            name: entry_name(key, host_layer),
            status: metadata_status(host_count, guest_count, host_last_edit, guest_last_edit),
            host_count,
            guest_count,
            matches: Some(MatchFlags {
                count_match: both_known(host_count, guest_count),
                timestamp_match: both_known(host_last_edit, guest_last_edit),
            }),
            host_last_edit,
            guest_last_edit,
        });
    }

    for (key, guest_layer) in &guest_keyed {
        if find(&host_keyed, key).is_some() {
            continue;
        }
        entries.push(MetadataEntry {
            kind,
            key: key.clone(),
            name: entry_name(key, guest_layer),
            status: EntryStatus::ExtraOnGuest,
            host_count: None,
            guest_count: safe_count(guest, guest_layer).await,
            matches: None,
            host_last_edit: None,
            guest_last_edit: last_edit_date(&guest_layer.properties),
        });
    }

    entries
}

/// Compares record counts and last-edit timestamps of every layer and table
/// of a host item and a guest item.
///
/// Never fails: an item that cannot be found or opened yields an `error`
/// payload with a message.
pub async fn compare_items(
    host: &dyn Portal,
    guest: &dyn Portal,
    host_item_id: &str,
    guest_item_id: &str,
    options: &ItemOptions,
) -> ItemComparison {
    let pair = match open_pair(host, guest, host_item_id, guest_item_id).await {
        Ok(pair) => pair,
        Err(message) => return ItemComparison::failed(host_item_id, guest_item_id, message),
    };

    let layers =
        compare_collection(CollectionKind::Layers, host, &pair.host, guest, &pair.guest).await;
    let tables =
        compare_collection(CollectionKind::Tables, host, &pair.host, guest, &pair.guest).await;

    let status = if layers
        .iter()
        .chain(tables.iter())
        .all(|e| e.status == EntryStatus::Ok)
    {
        ComparisonStatus::Ok
    } else {
        ComparisonStatus::Mismatch
    };

    let result = ItemComparison {
        status,
        message: None,
        host_item_id: host_item_id.to_string(),
        guest_item_id: guest_item_id.to_string(),
        title: Some(pair.host_item.title.clone()),
        host_url: Some(pair.host.url.clone()),
        guest_url: Some(pair.guest.url.clone()),
        layers,
        tables,
    };

    if options.verbose {
        info!(title = %pair.host_item.title, status = %result.status, "Compared service");
    } else {
        debug!(title = %pair.host_item.title, status = %result.status, "Compared service");
    }
    result
}
