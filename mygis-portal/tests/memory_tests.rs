use mygis_portal::{
    MemoryLayer, MemoryPortal, MemoryService, Portal, PortalError, PortalItem, QueryRequest,
};
use mygis_types::{GroupId, ItemId};
use pretty_assertions::assert_eq;
use serde_json::json;

const ROOT: &str = "https://services.example.com/arcgis/rest/services/Parcels/FeatureServer";

fn id(s: &str) -> ItemId {
    ItemId::parse(s).unwrap()
}

fn fixture() -> MemoryPortal {
    let layer = MemoryLayer::new(0, "Parcels")
        .object_id_field("OBJECTID")
        .field("NAME", "esriFieldTypeString")
        .paginated(2)
        .rows((1..=5).map(|n| json!({"OBJECTID": n, "NAME": format!("p{n}")})));
    let service = MemoryService::new(ROOT)
        .layer(layer)
        .table(MemoryLayer::new(1, "Owners"));

    MemoryPortal::new("https://host.example.com/portal")
        .with_user("alice")
        .with_item(
            PortalItem::new(id("item1"), "Parcels", "Feature Service")
                .with_url(ROOT)
                .with_owner("alice"),
        )
        .with_item(PortalItem::new(id("map1"), "Parcels map", "Web Map"))
        .with_service(service)
        .with_group("g1", &[&id("item1"), &id("map1"), &id("ghost")])
}

// ── Items & services ────────────────────────────────────────────

#[tokio::test]
async fn item_lookup() {
    let portal = fixture();
    assert!(portal.get_item(&id("item1")).await.unwrap().is_some());
    assert!(portal.get_item(&id("missing")).await.unwrap().is_none());
}

#[tokio::test]
async fn open_service_lists_layers_and_tables() {
    let portal = fixture();
    let item = portal.get_item(&id("item1")).await.unwrap().unwrap();
    let service = portal.open_service(&item).await.unwrap();
    assert_eq!(service.item_id, Some(id("item1")));
    assert_eq!(service.layers.len(), 1);
    assert_eq!(service.tables.len(), 1);
    assert_eq!(service.layers[0].url, format!("{ROOT}/0"));
    assert!(service.layers[0].properties.supports_pagination());
}

#[tokio::test]
async fn item_without_url_cannot_be_opened() {
    let portal = fixture();
    let item = portal.get_item(&id("map1")).await.unwrap().unwrap();
    let err = portal.open_service(&item).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn failing_open_is_an_error() {
    let portal = MemoryPortal::new("p")
        .with_service(MemoryService::new(ROOT).failing_open("service unavailable"));
    let err = portal.open_service_url(ROOT).await.unwrap_err();
    assert!(matches!(err, PortalError::Api { code: 500, .. }));
}

// ── Queries ─────────────────────────────────────────────────────

#[tokio::test]
async fn pages_are_capped_by_max_record_count() {
    let portal = fixture();
    let service = portal.open_service_url(ROOT).await.unwrap();
    let layer = &service.layers[0];

    let first = portal
        .query_page(layer, &QueryRequest::page("1=1", vec![], 0, 10))
        .await
        .unwrap();
    assert_eq!(first.rows.len(), 2);
    assert!(first.exceeded_transfer_limit);

    let last = portal
        .query_page(layer, &QueryRequest::page("1=1", vec![], 4, 2))
        .await
        .unwrap();
    assert_eq!(last.rows.len(), 1);
    assert!(!last.exceeded_transfer_limit);
}

#[tokio::test]
async fn where_and_projection() {
    let portal = fixture();
    let service = portal.open_service_url(ROOT).await.unwrap();
    let layer = &service.layers[0];

    assert_eq!(portal.query_count(layer, "NAME = 'p3'").await.unwrap(), 1);
    let page = portal
        .query_page(layer, &QueryRequest::all("objectid = 3", vec!["name".into()]))
        .await
        .unwrap();
    assert_eq!(page.rows.len(), 1);
    assert_eq!(page.rows[0].len(), 1);
    assert_eq!(page.rows[0]["NAME"], json!("p3"));
}

#[tokio::test]
async fn failing_queries_and_request_log() {
    let service = MemoryService::new(ROOT).layer(MemoryLayer::new(0, "L").failing_queries("timeout"));
    let portal = MemoryPortal::new("p").with_service(service);
    let opened = portal.open_service_url(ROOT).await.unwrap();

    assert_eq!(portal.query_count_made(), 0);
    let err = portal.query_count(&opened.layers[0], "1=1").await.unwrap_err();
    assert!(err.to_string().contains("timeout"));
    assert_eq!(portal.query_count_made(), 1);
    assert_eq!(portal.requests()[0], format!("open_service_url {ROOT}"));
}

// ── Groups & search ─────────────────────────────────────────────

#[tokio::test]
async fn group_items_skip_unknown_ids() {
    let portal = fixture();
    let items = portal
        .group_items(&GroupId::parse("g1").unwrap())
        .await
        .unwrap();
    let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["item1", "map1"]);
}

#[tokio::test]
async fn failing_group() {
    let portal = fixture().with_failing_group("g2", "forbidden");
    assert!(portal
        .group_items(&GroupId::parse("g2").unwrap())
        .await
        .is_err());
}

#[tokio::test]
async fn search_by_type_and_owner() {
    let portal = fixture();
    let items = portal
        .search_items("type:\"Feature Service\" AND owner:alice", 10)
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, id("item1"));

    let none = portal
        .search_items("type:\"Feature Service\" AND owner:bob", 10)
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn portal_self_reports_user() {
    let portal = fixture();
    assert_eq!(
        portal.portal_self().await.unwrap().username.as_deref(),
        Some("alice")
    );
}
