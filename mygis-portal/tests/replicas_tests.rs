use mygis_portal::{
    format_replica_table, list_replicas, list_sync_enabled_replicas, MemoryLayer, MemoryPortal,
    MemoryService, OwnerFilter, PortalError, PortalItem,
};
use mygis_types::ItemId;
use pretty_assertions::assert_eq;
use serde_json::json;

const SYNCED: &str = "https://services.example.com/arcgis/rest/services/Synced/FeatureServer";
const PLAIN: &str = "https://services.example.com/arcgis/rest/services/Plain/FeatureServer";
const BROKEN: &str = "https://services.example.com/arcgis/rest/services/Broken/FeatureServer";

fn id(s: &str) -> ItemId {
    ItemId::parse(s).unwrap()
}

fn replicas_body() -> serde_json::Value {
    json!({
        "replicas": [
            {
                "replicaID": "{A1}",
                "replicaName": "crew_a",
                "replicaOwner": "alice",
                "replicaType": "syncReplica",
                "creationDate": 1_700_000_000_000_i64,
                "lastSyncDate": 1_700_000_100,
                "replicaState": "inUse"
            },
            {"replicaID": "{B2}", "replicaName": "crew_b"}
        ]
    })
}

fn fixture() -> MemoryPortal {
    MemoryPortal::new("https://host.example.com/portal")
        .with_user("alice")
        .with_service(
            MemoryService::new(SYNCED)
                .sync_enabled(true)
                .layer(MemoryLayer::new(0, "Points"))
                .replicas(replicas_body()),
        )
        .with_service(MemoryService::new(PLAIN).sync_enabled(false))
        .with_service(
            MemoryService::new(BROKEN)
                .sync_enabled(true)
                .failing_open("service unavailable"),
        )
        .with_item(
            PortalItem::new(id("synced"), "Synced", "Feature Service")
                .with_url(SYNCED)
                .with_owner("alice"),
        )
        .with_item(
            PortalItem::new(id("plain"), "Plain", "Feature Service")
                .with_url(PLAIN)
                .with_owner("alice"),
        )
        .with_item(
            PortalItem::new(id("broken"), "Broken", "Feature Service")
                .with_url(BROKEN)
                .with_owner("bob"),
        )
}

// ── list_replicas ───────────────────────────────────────────────

#[tokio::test]
async fn list_by_layer_url() {
    let portal = fixture();
    let replicas = list_replicas(&portal, &format!("{SYNCED}/0")).await.unwrap();
    assert_eq!(replicas.len(), 2);
    assert_eq!(replicas[0].name.as_deref(), Some("crew_a"));
    assert_eq!(replicas[1].created, None);
    assert!(portal
        .requests()
        .contains(&format!("get_json {SYNCED}/replicas")));
}

#[tokio::test]
async fn list_by_item_id() {
    let portal = fixture();
    let replicas = list_replicas(&portal, "synced").await.unwrap();
    assert_eq!(replicas.len(), 2);
}

#[tokio::test]
async fn sync_disabled_yields_empty_without_request() {
    let portal = fixture();
    let replicas = list_replicas(&portal, PLAIN).await.unwrap();
    assert!(replicas.is_empty());
    assert!(!portal.requests().iter().any(|r| r.contains("/replicas")));
}

#[tokio::test]
async fn unknown_item_is_not_found() {
    let portal = fixture();
    let err = list_replicas(&portal, "nothere").await.unwrap_err();
    assert!(matches!(err, PortalError::NotFound(_)));
}

#[tokio::test]
async fn map_server_url_is_rejected() {
    let portal = fixture();
    let err = list_replicas(&portal, "https://h/arcgis/rest/services/x/MapServer")
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::InvalidUrl(_)));
}

#[tokio::test]
async fn non_object_body_is_empty() {
    let portal = MemoryPortal::new("p").with_service(
        MemoryService::new(SYNCED)
            .sync_enabled(true)
            .replicas(json!([{"replicaID": "x"}])),
    );
    assert!(list_replicas(&portal, SYNCED).await.unwrap().is_empty());
}

// ── Table ───────────────────────────────────────────────────────

#[tokio::test]
async fn table_renders_timestamps() {
    let portal = fixture();
    let replicas = list_replicas(&portal, SYNCED).await.unwrap();
    let table = format_replica_table(&replicas);
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[2].contains("2023-11-14 22:13:20 UTC"));
    assert!(lines[2].contains("2023-11-14 22:15:00 UTC"));
    assert!(lines[3].starts_with("{B2}"));
    assert_eq!(lines[4], "Total replicas: 2");
}

// ── list_sync_enabled_replicas ──────────────────────────────────

#[tokio::test]
async fn sync_enabled_search_skips_disabled_and_broken() {
    let portal = fixture();
    let results = list_sync_enabled_replicas(&portal, None, &OwnerFilter::Any, 100)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].item_id, id("synced"));
    assert_eq!(results[0].url, SYNCED);
    assert_eq!(results[0].replicas.len(), 2);
}

#[tokio::test]
async fn owner_me_resolves_signed_in_user() {
    let portal = fixture();
    list_sync_enabled_replicas(&portal, None, &OwnerFilter::Me, 100)
        .await
        .unwrap();
    assert!(portal
        .requests()
        .contains(&"search_items type:\"Feature Service\" AND owner:alice".to_string()));
}

#[tokio::test]
async fn owner_filter_limits_services() {
    let portal = fixture();
    let results = list_sync_enabled_replicas(&portal, None, &OwnerFilter::User("bob".into()), 100)
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn results_serialize_raw_replicas() {
    let portal = fixture();
    let results = list_sync_enabled_replicas(&portal, None, &OwnerFilter::Any, 100)
        .await
        .unwrap();
    let value = serde_json::to_value(&results).unwrap();
    assert_eq!(value[0]["item_id"], json!("synced"));
    assert_eq!(value[0]["replicas"][0]["replicaName"], json!("crew_a"));
}
