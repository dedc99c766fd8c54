use mygis_portal::{
    Credentials, LayerInfo, LayerProperties, Portal, PortalError, QueryRequest, RestPortal,
    RestPortalConfig,
};
use mygis_types::{GroupId, ItemId};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn portal_for(server: &MockServer, credentials: Credentials) -> RestPortal {
    RestPortal::new(RestPortalConfig {
        portal_url: server.uri(),
        credentials,
        timeout_secs: 5,
        ..Default::default()
    })
    .unwrap()
}

fn item_id(s: &str) -> ItemId {
    ItemId::parse(s).unwrap()
}

// ── Config defaults ─────────────────────────────────────────────

#[test]
fn rest_config_default() {
    let cfg = RestPortalConfig::default();
    assert_eq!(cfg.portal_url, "https://www.arcgis.com");
    assert_eq!(cfg.credentials, Credentials::Anonymous);
    assert_eq!(cfg.timeout_secs, 60);
    assert!(cfg.verify_cert);
}

#[test]
fn rest_config_serde_roundtrip() {
    let cfg = RestPortalConfig {
        portal_url: "https://gis.example.com/portal".into(),
        credentials: Credentials::ApiKey { key: "k".into() },
        ..Default::default()
    };
    let json = serde_json::to_string(&cfg).unwrap();
    let back: RestPortalConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back.portal_url, "https://gis.example.com/portal");
    assert_eq!(back.credentials, Credentials::ApiKey { key: "k".into() });
}

// ── Items ───────────────────────────────────────────────────────

#[tokio::test]
async fn get_item_parses_item_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sharing/rest/content/items/abc123"))
        .and(query_param("f", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "abc123",
            "title": "Parcels",
            "type": "Feature Service",
            "url": "https://services.example.com/arcgis/rest/services/Parcels/FeatureServer",
            "owner": "alice",
            "originItemId": "host999"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let portal = portal_for(&server, Credentials::Anonymous);
    let item = portal.get_item(&item_id("abc123")).await.unwrap().unwrap();
    assert_eq!(item.title, "Parcels");
    assert_eq!(item.item_type, "Feature Service");
    assert_eq!(item.owner.as_deref(), Some("alice"));
    assert_eq!(item.property("originItemId"), Some(&json!("host999")));
}

#[tokio::test]
async fn get_item_missing_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sharing/rest/content/items/nope"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": {"code": 400, "message": "Item does not exist or is inaccessible.", "details": []}
        })))
        .mount(&server)
        .await;

    let portal = portal_for(&server, Credentials::Anonymous);
    assert!(portal.get_item(&item_id("nope")).await.unwrap().is_none());
}

#[tokio::test]
async fn server_error_is_not_swallowed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sharing/rest/content/items/abc"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let portal = portal_for(&server, Credentials::Anonymous);
    match portal.get_item(&item_id("abc")).await {
        Err(PortalError::Api { code, message }) => {
            assert_eq!(code, 500);
            assert_eq!(message, "boom");
        }
        other => panic!("unexpected: {other:?}"),
    }
}

// ── Tokens ──────────────────────────────────────────────────────

#[tokio::test]
async fn user_password_generates_token_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sharing/rest/generateToken"))
        .and(body_string_contains("username=alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "tok-1", "expires": 1_900_000_000_000_i64, "ssl": true
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sharing/rest/portals/self"))
        .and(query_param("token", "tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Example Portal",
            "user": {"username": "alice"}
        })))
        .expect(2)
        .mount(&server)
        .await;

    let portal = portal_for(
        &server,
        Credentials::UserPassword {
            username: "alice".into(),
            password: "secret".into(),
        },
    );
    let me = portal.portal_self().await.unwrap();
    assert_eq!(me.portal_name.as_deref(), Some("Example Portal"));
    assert_eq!(me.username.as_deref(), Some("alice"));
    portal.portal_self().await.unwrap();
}

#[tokio::test]
async fn bad_credentials_are_auth_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sharing/rest/generateToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": {"code": 400, "message": "Unable to generate token.", "details": ["Invalid username or password."]}
        })))
        .mount(&server)
        .await;

    let portal = portal_for(
        &server,
        Credentials::UserPassword {
            username: "alice".into(),
            password: "wrong".into(),
        },
    );
    let err = portal.portal_self().await.unwrap_err();
    assert!(matches!(err, PortalError::Auth(_)), "got {err:?}");
    assert!(err.to_string().contains("Invalid username or password"));
}

#[tokio::test]
async fn api_key_is_sent_as_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sharing/rest/portals/self"))
        .and(query_param("token", "my-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "P"})))
        .expect(1)
        .mount(&server)
        .await;

    let portal = portal_for(&server, Credentials::ApiKey { key: "my-key".into() });
    let me = portal.portal_self().await.unwrap();
    assert_eq!(me.username, None);
}

// ── Search & groups ─────────────────────────────────────────────

#[tokio::test]
async fn group_items_follow_next_start() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sharing/rest/search"))
        .and(query_param("q", "group:g1"))
        .and(query_param("start", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "a", "title": "A", "type": "Feature Service"}],
            "nextStart": 2
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sharing/rest/search"))
        .and(query_param("q", "group:g1"))
        .and(query_param("start", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "b", "title": "B", "type": "Web Map"}],
            "nextStart": -1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let portal = portal_for(&server, Credentials::Anonymous);
    let items = portal
        .group_items(&GroupId::parse("g1").unwrap())
        .await
        .unwrap();
    let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[tokio::test]
async fn search_respects_max_items() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sharing/rest/search"))
        .and(query_param("num", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "a", "title": "A", "type": "Feature Service"},
                {"id": "b", "title": "B", "type": "Feature Service"}
            ],
            "nextStart": 3
        })))
        .expect(1)
        .mount(&server)
        .await;

    let portal = portal_for(&server, Credentials::Anonymous);
    let items = portal
        .search_items("type:\"Feature Service\"", 2)
        .await
        .unwrap();
    assert_eq!(items.len(), 2);
}

// ── Services & queries ──────────────────────────────────────────

#[tokio::test]
async fn open_service_url_reads_layers_and_tables() {
    let server = MockServer::start().await;
    let root = format!("{}/arcgis/rest/services/Parcels/FeatureServer", server.uri());
    Mock::given(method("GET"))
        .and(path("/arcgis/rest/services/Parcels/FeatureServer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "syncEnabled": true,
            "layers": [{"id": 0, "name": "Parcels"}],
            "tables": [{"id": 1, "name": "Owners"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/arcgis/rest/services/Parcels/FeatureServer/layers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "layers": [{"id": 0, "name": "Parcels", "objectIdField": "OBJECTID", "fields": []}],
            "tables": [{"id": 1, "name": "Owners", "fields": []}]
        })))
        .mount(&server)
        .await;

    let portal = portal_for(&server, Credentials::Anonymous);
    let service = portal
        .open_service_url(&format!("{root}/0"))
        .await
        .unwrap();
    assert_eq!(service.url, root);
    assert_eq!(service.sync_enabled(), Some(true));
    assert_eq!(service.layers.len(), 1);
    assert_eq!(service.layers[0].url, format!("{root}/0"));
    assert_eq!(service.layers[0].properties.object_id_field(), Some("OBJECTID"));
    assert_eq!(service.tables[0].listed_id, Some(1));
}

#[tokio::test]
async fn query_count_and_page() {
    let server = MockServer::start().await;
    let layer_url = format!("{}/arcgis/rest/services/P/FeatureServer/0", server.uri());
    Mock::given(method("GET"))
        .and(path("/arcgis/rest/services/P/FeatureServer/0/query"))
        .and(query_param("returnCountOnly", "true"))
        .and(query_param("where", "1=1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 42})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/arcgis/rest/services/P/FeatureServer/0/query"))
        .and(query_param("outFields", "ID,NAME"))
        .and(query_param("returnGeometry", "false"))
        .and(query_param("resultOffset", "10"))
        .and(query_param("resultRecordCount", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "features": [
                {"attributes": {"ID": 1, "NAME": "a"}},
                {"attributes": {"ID": 2, "NAME": "b"}}
            ],
            "exceededTransferLimit": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let portal = portal_for(&server, Credentials::Anonymous);
    let layer = LayerInfo::new(layer_url, Some(0), LayerProperties::default());

    assert_eq!(portal.query_count(&layer, "1=1").await.unwrap(), 42);

    let request = QueryRequest::page("1=1", vec!["ID".into(), "NAME".into()], 10, 5);
    let page = portal.query_page(&layer, &request).await.unwrap();
    assert_eq!(page.rows.len(), 2);
    assert_eq!(page.rows[1]["NAME"], json!("b"));
    assert!(page.exceeded_transfer_limit);
}

#[tokio::test]
async fn query_error_object_is_api_error() {
    let server = MockServer::start().await;
    let layer_url = format!("{}/arcgis/rest/services/P/FeatureServer/3", server.uri());
    Mock::given(method("GET"))
        .and(path("/arcgis/rest/services/P/FeatureServer/3/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": {"code": 400, "message": "Cannot perform query. Invalid query parameters."}
        })))
        .mount(&server)
        .await;

    let portal = portal_for(&server, Credentials::Anonymous);
    let layer = LayerInfo::new(layer_url, Some(3), LayerProperties::default());
    let err = portal
        .query_page(&layer, &QueryRequest::all("1=1", vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::Api { code: 400, .. }));
}
