//! Record-level comparison.
//!
//! Rows from each side are projected onto the reconciled field list and
//! counted as a multiset of attribute tuples. The delta between the two
//! multisets is what one side has more of than the other. Geometry is never
//! fetched or compared.

use crate::identity::{entry_name, find, keyed_layers};
use crate::metadata::safe_count;
use crate::open::open_pair;
use crate::schema::{comparable_fields, reconcile_fields, MissingFields, ReconciledFields};
use mygis_portal::{LayerInfo, Portal, PortalResult, QueryRequest, ServiceInfo};
use mygis_types::{AttrValue, CollectionKind, ComparisonStatus, EntryStatus, LayerKey};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Default where clause (all rows).
pub const DEFAULT_WHERE: &str = "1=1";

/// Default page size for paginated queries.
pub const DEFAULT_CHUNK_SIZE: u64 = 2000;

/// Options for [`compare_records`].
#[derive(Debug, Clone)]
pub struct RecordOptions {
    pub where_clause: String,
    /// Extra field names to leave out of the comparison.
    pub ignore_fields: Vec<String>,
    /// Restrict to layers whose key or name matches one of these
    /// (case-insensitive). Empty means all layers.
    pub layer_keys: Vec<String>,
    /// Page size; `0` fetches everything in one request.
    pub chunk_size: u64,
    /// Log the summary at info level (debug otherwise).
    pub verbose: bool,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            where_clause: DEFAULT_WHERE.to_string(),
            ignore_fields: Vec::new(),
            layer_keys: Vec::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            verbose: true,
        }
    }
}

/// Multiset of attribute tuples.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordMultiset {
    counts: HashMap<Vec<AttrValue>, u64>,
    rows: u64,
}

impl RecordMultiset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a row projected onto `fields`. Field lookup is exact first, then
    /// case-insensitive; absent attributes count as null.
    pub fn add_row(&mut self, row: &Map<String, Value>, fields: &[String]) {
        let tuple = fields
            .iter()
            .map(|field| {
                row.get(field)
                    .or_else(|| {
                        row.iter()
                            .find(|(k, _)| k.eq_ignore_ascii_case(field))
                            .map(|(_, v)| v)
                    })
                    .map(AttrValue::from_json)
                    .unwrap_or(AttrValue::Null)
            })
            .collect();
        self.add_tuple(tuple);
    }

    /// Adds an already-projected tuple.
    pub fn add_tuple(&mut self, tuple: Vec<AttrValue>) {
        *self.counts.entry(tuple).or_insert(0) += 1;
        self.rows += 1;
    }

    /// Occurrences of a tuple.
    pub fn count(&self, tuple: &[AttrValue]) -> u64 {
        self.counts.get(tuple).copied().unwrap_or(0)
    }

    /// Total rows added.
    pub fn total_rows(&self) -> u64 {
        self.rows
    }

    /// Number of distinct tuples.
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    /// Tuples this multiset has more of than `other`, with the surplus.
    /// Sorted by tuple.
    pub fn surplus_over(&self, other: &RecordMultiset) -> Vec<(Vec<AttrValue>, u64)> {
        let mut surplus: Vec<(Vec<AttrValue>, u64)> = self
            .counts
            .iter()
            .filter_map(|(tuple, &count)| {
                let theirs = other.count(tuple);
                (count > theirs).then(|| (tuple.clone(), count - theirs))
            })
            .collect();
        surplus.sort();
        surplus
    }
}

/// A tuple present more often on one side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordDiffRow {
    /// How many more times it occurs on this side.
    pub count: u64,
    /// The tuple, keyed by host field names.
    pub attributes: Map<String, Value>,
}

/// Symmetric multiset difference of two layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordDelta {
    pub host_only: Vec<RecordDiffRow>,
    pub guest_only: Vec<RecordDiffRow>,
    /// Rows streamed from the host.
    pub host_count: u64,
    /// Rows streamed from the guest.
    pub guest_count: u64,
}

impl RecordDelta {
    /// Computes the delta between two multisets. `fields` names the tuple
    /// positions in the output.
    pub fn between(host: &RecordMultiset, guest: &RecordMultiset, fields: &[String]) -> Self {
        let rows = |surplus: Vec<(Vec<AttrValue>, u64)>| -> Vec<RecordDiffRow> {
            surplus
                .into_iter()
                .map(|(tuple, count)| RecordDiffRow {
                    count,
                    attributes: fields
                        .iter()
                        .cloned()
                        .zip(tuple.iter().map(AttrValue::to_json))
                        .collect(),
                })
                .collect()
        };
        Self {
            host_only: rows(host.surplus_over(guest)),
            guest_only: rows(guest.surplus_over(host)),
            host_count: host.total_rows(),
            guest_count: guest.total_rows(),
        }
    }

    /// True when both sides hold the same multiset.
    pub fn is_empty(&self) -> bool {
        self.host_only.is_empty() && self.guest_only.is_empty()
    }
}

/// Streams a layer's rows into a multiset.
///
/// Pages with `resultOffset`/`resultRecordCount` when the layer supports it
/// and `chunk_size > 0`, otherwise issues one unbounded request. Paging
/// continues while the server reports `exceededTransferLimit` or returns a
/// full page, and stops on an empty page. When the matching row count is
/// known, paging also stops once that many rows have arrived, so a server
/// that ignores `resultOffset` cannot keep the loop going.
pub async fn fetch_multiset(
    portal: &dyn Portal,
    layer: &LayerInfo,
    fields: &[String],
    where_clause: &str,
    chunk_size: u64,
) -> PortalResult<RecordMultiset> {
    let mut multiset = RecordMultiset::new();

    if chunk_size == 0 || !layer.properties.supports_pagination() {
        let page = portal
            .query_page(layer, &QueryRequest::all(where_clause, fields.to_vec()))
            .await?;
        for row in &page.rows {
            multiset.add_row(row, fields);
        }
        if page.exceeded_transfer_limit {
            warn!(url = %layer.url, "Server truncated an unpaged query; comparison may be incomplete");
        }
        return Ok(multiset);
    }

    let expected = match portal.query_count(layer, where_clause).await {
        Ok(count) => Some(count),
        Err(e) => {
            debug!(url = %layer.url, error = %e, "Count query failed; paging until the server stops");
            None
        }
    };

    let mut offset = 0u64;
    loop {
        let request = QueryRequest::page(where_clause, fields.to_vec(), offset, chunk_size);
        let page = portal.query_page(layer, &request).await?;
        let received = page.rows.len() as u64;
        for row in &page.rows {
            multiset.add_row(row, fields);
        }
        debug!(url = %layer.url, offset, received, "Fetched page");

        if received == 0 {
            break;
        }
        offset += received;
        if !page.exceeded_transfer_limit && received < chunk_size {
            break;
        }
        if let Some(expected) = expected.filter(|e| offset >= *e) {
            if page.exceeded_transfer_limit {
                warn!(
                    url = %layer.url,
                    expected,
                    received = offset,
                    "Server reports more rows past the record count; stopping"
                );
            }
            break;
        }
    }

    Ok(multiset)
}

/// Diffs the records of a host layer and a guest layer over reconciled fields.
pub async fn diff_records(
    host: &dyn Portal,
    host_layer: &LayerInfo,
    guest: &dyn Portal,
    guest_layer: &LayerInfo,
    fields: &ReconciledFields,
    where_clause: &str,
    chunk_size: u64,
) -> PortalResult<RecordDelta> {
    let host_set = fetch_multiset(host, host_layer, &fields.host, where_clause, chunk_size).await?;
    let guest_set =
        fetch_multiset(guest, guest_layer, &fields.guest, where_clause, chunk_size).await?;
    Ok(RecordDelta::between(&host_set, &guest_set, &fields.host))
}

/// Record comparison of one layer or table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordEntry {
    pub kind: CollectionKind,
    pub key: LayerKey,
    pub name: String,
    pub status: EntryStatus,
    pub host_count: Option<u64>,
    pub guest_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub host_only: Vec<RecordDiffRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub guest_only: Vec<RecordDiffRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_fields_on_guest: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RecordEntry {
    fn new(kind: CollectionKind, key: &LayerKey, name: String, status: EntryStatus) -> Self {
        Self {
            kind,
            key: key.clone(),
            name,
            status,
            host_count: None,
            guest_count: None,
            fields: None,
            host_only: Vec::new(),
            guest_only: Vec::new(),
            missing_fields_on_guest: None,
            message: None,
        }
    }
}

/// Result of a record-level comparison of two items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordComparison {
    pub status: ComparisonStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub host_item_id: String,
    pub guest_item_id: String,
    pub title: Option<String>,
    pub host_url: Option<String>,
    pub guest_url: Option<String>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignored_fields: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer_keys: Option<Vec<String>>,
    pub layers: Vec<RecordEntry>,
    pub tables: Vec<RecordEntry>,
}

impl RecordComparison {
    fn new(host_item_id: &str, guest_item_id: &str, options: &RecordOptions) -> Self {
        let non_empty = |v: &Vec<String>| (!v.is_empty()).then(|| v.clone());
        Self {
            status: ComparisonStatus::Ok,
            message: None,
            host_item_id: host_item_id.to_string(),
            guest_item_id: guest_item_id.to_string(),
            title: None,
            host_url: None,
            guest_url: None,
            where_clause: (options.where_clause.trim() != DEFAULT_WHERE)
                .then(|| options.where_clause.clone()),
            chunk_size: (options.chunk_size != DEFAULT_CHUNK_SIZE).then_some(options.chunk_size),
            ignored_fields: non_empty(&options.ignore_fields),
            layer_keys: non_empty(&options.layer_keys),
            layers: Vec::new(),
            tables: Vec::new(),
        }
    }

    /// Entries of both collections, layers first.
    pub fn entries(&self) -> impl Iterator<Item = &RecordEntry> {
        self.layers.iter().chain(self.tables.iter())
    }
}

/// Overall status: any error wins, then any mismatch or one-sided layer.
/// Skipped entries do not count.
pub fn overall_status<'a>(statuses: impl IntoIterator<Item = &'a EntryStatus>) -> ComparisonStatus {
    let mut overall = ComparisonStatus::Ok;
    for status in statuses {
        match status {
            EntryStatus::Error => return ComparisonStatus::Error,
            EntryStatus::Mismatch
            | EntryStatus::MissingOnGuest
            | EntryStatus::MissingOnHost
            | EntryStatus::ExtraOnGuest => overall = ComparisonStatus::Mismatch,
            EntryStatus::Ok | EntryStatus::Skipped => {}
        }
    }
    overall
}

fn selected(selectors: &[String], key: &LayerKey, layer: &LayerInfo) -> bool {
    selectors.is_empty()
        || selectors.iter().any(|s| {
            key.matches(s)
                || layer
                    .properties
                    .name()
                    .is_some_and(|name| name.eq_ignore_ascii_case(s.trim()))
        })
}

async fn compare_pair(
    kind: CollectionKind,
    key: &LayerKey,
    host: &dyn Portal,
    host_layer: &LayerInfo,
    guest: &dyn Portal,
    guest_layer: &LayerInfo,
    options: &RecordOptions,
) -> RecordEntry {
    let name = entry_name(key, host_layer);
    let host_fields = comparable_fields(host_layer, &options.ignore_fields);

    if host_fields.is_empty() {
        let mut entry = RecordEntry::new(kind, key, name, EntryStatus::Skipped);
        entry.message = Some("No comparable fields (no attributes or object-id field)".to_string());
        return entry;
    }

    let fields = match reconcile_fields(&host_fields, guest_layer) {
        Ok(fields) => fields,
        Err(MissingFields(missing)) => {
            let mut entry = RecordEntry::new(kind, key, name, EntryStatus::Error);
            entry.message = Some(format!("Fields missing on guest: {}", missing.join(", ")));
            entry.fields = Some(host_fields);
            entry.missing_fields_on_guest = Some(missing);
            return entry;
        }
    };

    match diff_records(
        host,
        host_layer,
        guest,
        guest_layer,
        &fields,
        &options.where_clause,
        options.chunk_size,
    )
    .await
    {
        Ok(delta) => {
            let status = if delta.is_empty() {
                EntryStatus::Ok
            } else {
                EntryStatus::Mismatch
            };
            let mut entry = RecordEntry::new(kind, key, name, status);
            entry.host_count = Some(delta.host_count);
            entry.guest_count = Some(delta.guest_count);
            entry.fields = Some(fields.host);
            entry.host_only = delta.host_only;
            entry.guest_only = delta.guest_only;
            entry
        }
        Err(e) => {
            warn!(key = %key, error = %e, "Record query failed");
            let mut entry = RecordEntry::new(kind, key, name, EntryStatus::Error);
            entry.fields = Some(fields.host);
            entry.message = Some(e.to_string());
            entry
        }
    }
}

async fn compare_collection(
    kind: CollectionKind,
    host: &dyn Portal,
    host_service: &ServiceInfo,
    guest: &dyn Portal,
    guest_service: &ServiceInfo,
    options: &RecordOptions,
) -> Vec<RecordEntry> {
    let host_keyed = keyed_layers(host_service.collection(kind));
    let guest_keyed = keyed_layers(guest_service.collection(kind));
    let mut entries = Vec::new();

    for (key, host_layer) in &host_keyed {
        if !selected(&options.layer_keys, key, host_layer) {
            continue;
        }
        let entry = match find(&guest_keyed, key) {
            Some(guest_layer) => {
                compare_pair(kind, key, host, host_layer, guest, guest_layer, options).await
            }
            None => {
                let mut entry = RecordEntry::new(
                    kind,
                    key,
                    entry_name(key, host_layer),
                    EntryStatus::MissingOnGuest,
                );
                entry.host_count = safe_count(host, host_layer).await;
                entry
            }
        };
        entries.push(entry);
    }

    for (key, guest_layer) in &guest_keyed {
        if find(&host_keyed, key).is_some() || !selected(&options.layer_keys, key, guest_layer) {
            continue;
        }
        let mut entry = RecordEntry::new(
            kind,
            key,
            entry_name(key, guest_layer),
            EntryStatus::MissingOnHost,
        );
        entry.guest_count = safe_count(guest, guest_layer).await;
        entries.push(entry);
    }

    entries
}

/// Compares the records of every matched layer and table of two items.
///
/// Never fails: an item that cannot be opened yields an `error` payload, and
/// a failing query marks only its own entry as `error`.
pub async fn compare_records(
    host: &dyn Portal,
    guest: &dyn Portal,
    host_item_id: &str,
    guest_item_id: &str,
    options: &RecordOptions,
) -> RecordComparison {
    let mut result = RecordComparison::new(host_item_id, guest_item_id, options);

    let pair = match open_pair(host, guest, host_item_id, guest_item_id).await {
        Ok(pair) => pair,
        Err(message) => {
            result.status = ComparisonStatus::Error;
            result.message = Some(message);
            return result;
        }
    };

    result.title = Some(pair.host_item.title.clone());
    result.host_url = Some(pair.host.url.clone());
    result.guest_url = Some(pair.guest.url.clone());
    result.layers = compare_collection(
        CollectionKind::Layers,
        host,
        &pair.host,
        guest,
        &pair.guest,
        options,
    )
    .await;
    result.tables = compare_collection(
        CollectionKind::Tables,
        host,
        &pair.host,
        guest,
        &pair.guest,
        options,
    )
    .await;
    result.status = overall_status(result.entries().map(|e| &e.status));

    if options.verbose {
        info!(title = %pair.host_item.title, status = %result.status, "Compared records");
    } else {
        debug!(title = %pair.host_item.title, status = %result.status, "Compared records");
    }
    result
}
