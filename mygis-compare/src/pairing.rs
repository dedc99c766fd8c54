//! Pairing of collaborated items between a host group and a guest group.

use mygis_portal::{Portal, PortalItem};
use mygis_types::GroupId;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Item type of hosted feature services.
pub const FEATURE_SERVICE_TYPE: &str = "Feature Service";

/// Item properties that may carry the id of the item a copy came from.
pub const ORIGIN_ID_KEYS: [&str; 6] = [
    "originItemID",
    "originItemId",
    "sourceItemID",
    "sourceItemId",
    "sourceitemid",
    "source_service_item_id",
];

/// How a pair was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PairMatch {
    OriginId,
    TitleAndType,
}

/// A host item and the guest item it was paired with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemPair {
    pub host: PortalItem,
    pub guest: PortalItem,
    pub matched_by: PairMatch,
}

/// The origin/source item id recorded on a copied item, if any.
pub fn origin_item_id(item: &PortalItem) -> Option<String> {
    ORIGIN_ID_KEYS.iter().find_map(|key| match item.property(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Pairs host items with guest items.
///
/// A guest item whose origin id equals the host item id wins; otherwise an
/// exact `(title, type)` match is used. Unmatched host items are dropped.
/// When several guest items share an origin id or a `(title, type)`, the
/// last one listed is used. With `strict_type` only feature services take
/// part on either side.
pub fn pair_items(
    host_items: &[PortalItem],
    guest_items: &[PortalItem],
    strict_type: bool,
) -> Vec<ItemPair> {
    let eligible = |item: &&PortalItem| !strict_type || item.item_type == FEATURE_SERVICE_TYPE;

    let mut by_origin: HashMap<String, &PortalItem> = HashMap::new();
    let mut by_title: HashMap<(&str, &str), &PortalItem> = HashMap::new();
    for guest in guest_items.iter().filter(eligible) {
        if let Some(origin) = origin_item_id(guest) {
            by_origin.insert(origin, guest);
        }
        by_title.insert((guest.title.as_str(), guest.item_type.as_str()), guest);
    }

    host_items
        .iter()
        .filter(eligible)
        .filter_map(|host| {
            if let Some(guest) = by_origin.get(host.id.as_str()) {
                return Some(ItemPair {
                    host: host.clone(),
                    guest: (*guest).clone(),
                    matched_by: PairMatch::OriginId,
                });
            }
            by_title
                .get(&(host.title.as_str(), host.item_type.as_str()))
                .map(|guest| ItemPair {
                    host: host.clone(),
                    guest: (*guest).clone(),
                    matched_by: PairMatch::TitleAndType,
                })
        })
        .collect()
}

async fn list_group(portal: &dyn Portal, group: &GroupId) -> Vec<PortalItem> {
    match portal.group_items(group).await {
        Ok(items) => items,
        Err(e) => {
            warn!(group = %group, portal = portal.portal_url(), error = %e, "Could not list group content");
            Vec::new()
        }
    }
}

/// Lists both groups and pairs their items. A group that cannot be listed
/// contributes no items.
pub async fn pair_group_items(
    host: &dyn Portal,
    guest: &dyn Portal,
    host_group: &GroupId,
    guest_group: &GroupId,
    strict_type: bool,
) -> Vec<ItemPair> {
    let host_items = list_group(host, host_group).await;
    let guest_items = list_group(guest, guest_group).await;
    let pairs = pair_items(&host_items, &guest_items, strict_type);
    debug!(
        host_items = host_items.len(),
        guest_items = guest_items.len(),
        pairs = pairs.len(),
        "Paired group items"
    );
    pairs
}
