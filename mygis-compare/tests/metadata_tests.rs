use mygis_compare::metadata::metadata_status;
use mygis_compare::{compare_items, last_edit_date, ItemOptions};
use mygis_portal::{LayerProperties, MemoryLayer, MemoryPortal, MemoryService, PortalItem};
use mygis_types::{CollectionKind, ComparisonStatus, EntryStatus, ItemId, LayerKey};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;

const HOST_URL: &str = "https://host.example.com/server/rest/services/Parcels/FeatureServer";
const GUEST_URL: &str = "https://guest.example.com/server/rest/services/Parcels/FeatureServer";

fn id(s: &str) -> ItemId {
    ItemId::parse(s).unwrap()
}

fn rows(n: i64) -> Vec<serde_json::Value> {
    (1..=n).map(|i| json!({"OBJECTID": i, "NAME": format!("r{i}")})).collect()
}

fn host_portal(service: MemoryService) -> MemoryPortal {
    MemoryPortal::new("https://host.example.com/portal")
        .with_item(PortalItem::new(id("hostitem"), "Parcels", "Feature Service").with_url(HOST_URL))
        .with_service(service)
}

fn guest_portal(service: MemoryService) -> MemoryPortal {
    MemoryPortal::new("https://guest.example.com/portal")
        .with_item(PortalItem::new(id("guestitem"), "Parcels", "Feature Service").with_url(GUEST_URL))
        .with_service(service)
}

fn opts() -> ItemOptions {
    ItemOptions { verbose: false }
}

// ── last_edit_date ──────────────────────────────────────────────

#[test]
fn last_edit_lookup_order() {
    let props = |v| LayerProperties::from_value(v);
    assert_eq!(
        last_edit_date(&props(json!({"editingInfo": {"lastEditDate": 5}, "updateDate": 9}))),
        Some(5)
    );
    assert_eq!(
        last_edit_date(&props(json!({"editinginfo": {"last_edit_date": 6}}))),
        Some(6)
    );
    assert_eq!(last_edit_date(&props(json!({"lastEditDate": 7}))), Some(7));
    assert_eq!(last_edit_date(&props(json!({"updateDate": 8}))), Some(8));
    assert_eq!(last_edit_date(&props(json!({"editingInfo": "junk"}))), None);
}

// ── Status rule ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn ok_iff_counts_equal_and_known_timestamps_equal(
        hc in proptest::option::of(0u64..5),
        gc in proptest::option::of(0u64..5),
        ht in proptest::option::of(0i64..3),
        gt in proptest::option::of(0i64..3),
    ) {
        let expected_ok = hc == gc && match (ht, gt) {
            (Some(h), Some(g)) => h == g,
            _ => true,
        };
        let status = metadata_status(hc, gc, ht, gt);
        prop_assert_eq!(status == EntryStatus::Ok, expected_ok);
    }
}

// ── compare_items ───────────────────────────────────────────────

#[tokio::test]
async fn identical_services_are_ok() {
    let make = |url| {
        MemoryService::new(url)
            .layer(MemoryLayer::new(0, "Parcels").last_edit(1000).rows(rows(3)))
            .table(MemoryLayer::new(1, "Owners").rows(rows(2)))
    };
    let host = host_portal(make(HOST_URL));
    let guest = guest_portal(make(GUEST_URL));

    let result = compare_items(&host, &guest, "hostitem", "guestitem", &opts()).await;
    assert_eq!(result.status, ComparisonStatus::Ok);
    assert_eq!(result.title.as_deref(), Some("Parcels"));
    assert_eq!(result.host_url.as_deref(), Some(HOST_URL));
    assert_eq!(result.layers.len(), 1);
    assert_eq!(result.tables.len(), 1);
    assert_eq!(result.layers[0].host_count, Some(3));
    assert_eq!(result.tables[0].kind, CollectionKind::Tables);
    let flags = result.layers[0].matches.unwrap();
    assert_eq!(flags.count_match, Some(true));
    assert_eq!(flags.timestamp_match, Some(true));
}

#[tokio::test]
async fn count_and_timestamp_mismatches() {
    let host = host_portal(
        MemoryService::new(HOST_URL)
            .layer(MemoryLayer::new(0, "Parcels").last_edit(1000).rows(rows(3)))
            .layer(MemoryLayer::new(1, "Roads").last_edit(1000).rows(rows(1))),
    );
    let guest = guest_portal(
        MemoryService::new(GUEST_URL)
            .layer(MemoryLayer::new(0, "Parcels").last_edit(1000).rows(rows(2)))
            .layer(MemoryLayer::new(1, "Roads").last_edit(2000).rows(rows(1))),
    );

    let result = compare_items(&host, &guest, "hostitem", "guestitem", &opts()).await;
    assert_eq!(result.status, ComparisonStatus::Mismatch);
    assert_eq!(result.layers[0].status, EntryStatus::Mismatch);
    assert_eq!(result.layers[0].matches.unwrap().count_match, Some(false));
    assert_eq!(result.layers[1].status, EntryStatus::Mismatch);
    assert_eq!(result.layers[1].matches.unwrap().timestamp_match, Some(false));
}

#[tokio::test]
async fn unknown_timestamp_does_not_cause_mismatch() {
    let host = host_portal(
        MemoryService::new(HOST_URL).layer(MemoryLayer::new(0, "Parcels").last_edit(1).rows(rows(2))),
    );
    let guest = guest_portal(
        MemoryService::new(GUEST_URL).layer(MemoryLayer::new(0, "Parcels").rows(rows(2))),
    );
    let result = compare_items(&host, &guest, "hostitem", "guestitem", &opts()).await;
    assert_eq!(result.status, ComparisonStatus::Ok);
    assert_eq!(result.layers[0].matches.unwrap().timestamp_match, None);
}

#[tokio::test]
async fn one_sided_layers() {
    let host = host_portal(
        MemoryService::new(HOST_URL)
            .layer(MemoryLayer::new(0, "Parcels").rows(rows(1)))
            .layer(MemoryLayer::new(1, "HostOnly").rows(rows(4))),
    );
    let guest = guest_portal(
        MemoryService::new(GUEST_URL)
            .layer(MemoryLayer::new(0, "Parcels").rows(rows(1)))
            .layer(MemoryLayer::new(5, "GuestOnly").last_edit(77).rows(rows(2))),
    );

    let result = compare_items(&host, &guest, "hostitem", "guestitem", &opts()).await;
    assert_eq!(result.status, ComparisonStatus::Mismatch);
    let statuses: Vec<(String, EntryStatus)> = result
        .layers
        .iter()
        .map(|e| (e.key.to_string(), e.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("Parcels".to_string(), EntryStatus::Ok),
            ("HostOnly".to_string(), EntryStatus::MissingOnGuest),
            ("GuestOnly".to_string(), EntryStatus::ExtraOnGuest),
        ]
    );
    assert_eq!(result.layers[1].host_count, Some(4));
    assert_eq!(result.layers[1].guest_count, None);
    assert!(result.layers[1].matches.is_none());
    assert_eq!(result.layers[2].guest_count, Some(2));
    assert_eq!(result.layers[2].guest_last_edit, Some(77));
}

#[tokio::test]
async fn unnamed_layers_align_by_id() {
    let host = host_portal(
        MemoryService::new(HOST_URL)
            .layer(MemoryLayer::new(3, "x").without_property("name").rows(rows(1))),
    );
    let guest = guest_portal(
        MemoryService::new(GUEST_URL)
            .layer(MemoryLayer::new(3, "y").without_property("name").rows(rows(1))),
    );
    let result = compare_items(&host, &guest, "hostitem", "guestitem", &opts()).await;
    assert_eq!(result.layers[0].key, LayerKey::Indexed(3));
    assert_eq!(result.layers[0].name, "id:3");
    assert_eq!(result.status, ComparisonStatus::Ok);
}

#[tokio::test]
async fn count_failure_degrades_to_none() {
    let host = host_portal(
        MemoryService::new(HOST_URL)
            .layer(MemoryLayer::new(0, "Parcels").failing_queries("timeout")),
    );
    let guest = guest_portal(
        MemoryService::new(GUEST_URL).layer(MemoryLayer::new(0, "Parcels").rows(rows(2))),
    );
    let result = compare_items(&host, &guest, "hostitem", "guestitem", &opts()).await;
    assert_eq!(result.layers[0].host_count, None);
    assert_eq!(result.layers[0].guest_count, Some(2));
    assert_eq!(result.layers[0].status, EntryStatus::Mismatch);
    assert_eq!(result.layers[0].matches.unwrap().count_match, None);
}

#[tokio::test]
async fn missing_item_is_error() {
    let host = host_portal(MemoryService::new(HOST_URL));
    let guest = guest_portal(MemoryService::new(GUEST_URL));
    let result = compare_items(&host, &guest, "hostitem", "nosuchitem", &opts()).await;
    assert_eq!(result.status, ComparisonStatus::Error);
    assert_eq!(result.message.as_deref(), Some("One or both items not found"));
    assert!(result.layers.is_empty());
}

#[tokio::test]
async fn unopenable_service_is_error() {
    let host = host_portal(MemoryService::new(HOST_URL));
    let guest = guest_portal(MemoryService::new(GUEST_URL).failing_open("Service unavailable"));
    let result = compare_items(&host, &guest, "hostitem", "guestitem", &opts()).await;
    assert_eq!(result.status, ComparisonStatus::Error);
    assert!(result.message.unwrap().contains("Service unavailable"));
}

#[tokio::test]
async fn payload_shape() {
    let host = host_portal(
        MemoryService::new(HOST_URL).layer(MemoryLayer::new(0, "Parcels").rows(rows(1))),
    );
    let guest = guest_portal(MemoryService::new(GUEST_URL));
    let result = compare_items(&host, &guest, "hostitem", "guestitem", &opts()).await;
    let value = serde_json::to_value(&result).unwrap();

    assert_eq!(value["status"], json!("mismatch"));
    assert_eq!(value["host_item_id"], json!("hostitem"));
    assert!(value.get("message").is_none());
    let entry = &value["layers"][0];
    assert_eq!(entry["kind"], json!("layers"));
    assert_eq!(entry["key"], json!("Parcels"));
    assert_eq!(entry["status"], json!("missing_on_guest"));
    assert_eq!(entry["guest_count"], json!(null));
    assert!(entry.get("count_match").is_none());
    assert_eq!(value["tables"], json!([]));
}
