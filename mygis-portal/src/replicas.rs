//! Sync replica listing for feature services.

use crate::error::{PortalError, PortalResult};
use crate::portal::Portal;
use crate::service::{value_as_i64, ServiceInfo};
use crate::url::{feature_server_root, join};
use chrono::DateTime;
use mygis_types::ItemId;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// Default content search for hosted feature services.
pub const FEATURE_SERVICE_QUERY: &str = "type:\"Feature Service\"";

/// Epoch values below this are seconds rather than milliseconds.
const SECONDS_THRESHOLD: i64 = 10_000_000_000;

const MIN_COLUMN_WIDTH: usize = 12;

/// One replica as reported by `{FeatureServer}/replicas`.
///
/// Serializes as the raw JSON object the server returned.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub owner: Option<String>,
    pub replica_type: Option<String>,
    /// Creation time, epoch milliseconds or seconds as reported.
    pub created: Option<i64>,
    pub last_sync: Option<i64>,
    pub state: Option<String>,
    pub raw: Map<String, Value>,
}

impl ReplicaRecord {
    /// Reads a replica from its JSON object. Missing keys become `None`.
    pub fn from_json(raw: Map<String, Value>) -> Self {
        let text = |key: &str| raw.get(key).and_then(value_as_text);
        let epoch = |key: &str| raw.get(key).and_then(value_as_i64);
        Self {
            id: text("replicaID"),
            name: text("replicaName"),
            owner: text("replicaOwner"),
            replica_type: text("replicaType"),
            created: epoch("creationDate"),
            last_sync: epoch("lastSyncDate"),
            state: text("replicaState"),
            raw,
        }
    }

    fn cells(&self) -> [String; 7] {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        let time = |v: Option<i64>| v.map(epoch_to_iso).unwrap_or_default();
        [
            text(&self.id),
            text(&self.name),
            text(&self.owner),
            text(&self.replica_type),
            time(self.created),
            time(self.last_sync),
            text(&self.state),
        ]
    }
}

impl Serialize for ReplicaRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Formats an epoch timestamp as `YYYY-MM-DD HH:MM:SS UTC`.
///
/// Values below 10^10 are taken as seconds, the rest as milliseconds.
/// Out-of-range values are returned as the plain number.
pub fn epoch_to_iso(epoch: i64) -> String {
    let millis = if epoch < SECONDS_THRESHOLD {
        epoch.saturating_mul(1000)
    } else {
        epoch
    };
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| epoch.to_string())
}

/// Renders replicas as a fixed-width table followed by a total line.
pub fn format_replica_table(replicas: &[ReplicaRecord]) -> String {
    const HEADERS: [&str; 7] = ["id", "name", "owner", "type", "created", "last_sync", "state"];

    let rows: Vec<[String; 7]> = replicas.iter().map(ReplicaRecord::cells).collect();
    let mut widths: Vec<usize> = HEADERS
        .iter()
        .map(|h| h.len().max(MIN_COLUMN_WIDTH))
        .collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: &mut dyn Iterator<Item = String>| -> String {
        cells
            .zip(widths.iter())
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = Vec::with_capacity(rows.len() + 3);
    out.push(line(&mut HEADERS.iter().map(|h| h.to_string())));
    out.push(line(&mut widths.iter().map(|w| "-".repeat(*w))));
    for row in rows {
        out.push(line(&mut row.into_iter()));
    }
    out.push(format!("Total replicas: {}", replicas.len()));
    out.join("\n")
}

/// Opens the service behind `target`: a URL (service or layer) or an item id.
async fn open_target(portal: &dyn Portal, target: &str) -> PortalResult<ServiceInfo> {
    let target = target.trim();
    if target.starts_with("http") {
        let root = feature_server_root(target)?;
        return portal.open_service_url(&root).await;
    }

    let id = ItemId::parse(target).map_err(|e| PortalError::NotFound(e.to_string()))?;
    let item = portal
        .get_item(&id)
        .await?
        .ok_or_else(|| PortalError::NotFound(format!("item {id} not found or not accessible")))?;
    portal.open_service(&item).await
}

async fn fetch_replicas(
    portal: &dyn Portal,
    service: &ServiceInfo,
) -> PortalResult<Vec<ReplicaRecord>> {
    let body = portal
        .get_json(&join(&service.url, "replicas"), &[("f", "json")])
        .await?;
    let replicas = body
        .as_object()
        .and_then(|o| o.get("replicas"))
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| e.as_object().cloned())
                .map(ReplicaRecord::from_json)
                .collect()
        })
        .unwrap_or_default();
    Ok(replicas)
}

/// Lists the replicas of a feature service.
///
/// Returns an empty list when the service reports `syncEnabled: false`.
pub async fn list_replicas(portal: &dyn Portal, target: &str) -> PortalResult<Vec<ReplicaRecord>> {
    let service = open_target(portal, target).await?;
    if service.sync_enabled() == Some(false) {
        warn!(url = %service.url, "Service does not have sync enabled; replicas will not exist");
        return Ok(Vec::new());
    }

    let replicas = fetch_replicas(portal, &service).await?;
    info!(url = %service.url, count = replicas.len(), "Listed replicas");
    Ok(replicas)
}

/// Replicas of one sync-enabled service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncServiceReplicas {
    pub item_id: ItemId,
    pub title: String,
    pub url: String,
    pub replicas: Vec<ReplicaRecord>,
}

/// Owner filter for service searches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerFilter {
    /// No owner restriction (`*`).
    Any,
    /// The signed-in user (`me`).
    Me,
    User(String),
}

impl OwnerFilter {
    /// Parses `me`, `*` or a username. Blank values mean [`OwnerFilter::Any`].
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "" | "*" => OwnerFilter::Any,
            v if v.eq_ignore_ascii_case("me") => OwnerFilter::Me,
            v => OwnerFilter::User(v.to_string()),
        }
    }
}

/// Lists replicas for every sync-enabled feature service found by a search.
///
/// `query` defaults to all feature services. Services that cannot be opened
/// or whose replicas cannot be read are logged and skipped.
pub async fn list_sync_enabled_replicas(
    portal: &dyn Portal,
    query: Option<&str>,
    owner: &OwnerFilter,
    max_items: usize,
) -> PortalResult<Vec<SyncServiceReplicas>> {
    let owner = match owner {
        OwnerFilter::Any => None,
        OwnerFilter::User(name) => Some(name.clone()),
        OwnerFilter::Me => {
            let me = portal.portal_self().await?.username;
            if me.is_none() {
                warn!("Owner 'me' requested but no user is signed in; searching all owners");
            }
            me
        }
    };

    let base = query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .unwrap_or(FEATURE_SERVICE_QUERY);
    let search = match &owner {
        Some(owner) => format!("{base} AND owner:{owner}"),
        None => base.to_string(),
    };
    debug!(query = %search, max_items, "Searching for sync-enabled services");

    let items = portal.search_items(&search, max_items).await?;
    let mut results = Vec::new();

    for item in items {
        if item.url.is_none() {
            continue;
        }
        let service = match portal.open_service(&item).await {
            Ok(service) => service,
            Err(e) => {
                warn!(item_id = %item.id, error = %e, "Skipping service that could not be opened");
                continue;
            }
        };
        if service.sync_enabled() != Some(true) {
            continue;
        }
        match fetch_replicas(portal, &service).await {
            Ok(replicas) => results.push(SyncServiceReplicas {
                item_id: item.id.clone(),
                title: item.title.clone(),
                url: service.url.clone(),
                replicas,
            }),
            Err(e) => {
                warn!(item_id = %item.id, error = %e, "Skipping service whose replicas could not be read");
            }
        }
    }

    info!(services = results.len(), "Listed sync-enabled services");
    Ok(results)
}
