//! ArcGIS REST implementation of [`Portal`].
//!
//! Uses the portal sharing API (`/sharing/rest/...`) for items, groups and
//! search, and the feature-service REST API for layer metadata and queries.
//! Requests are issued one at a time; there is no retry layer.

use crate::error::{PortalError, PortalResult};
use crate::portal::Portal;
use crate::service::{
    value_as_i64, LayerInfo, LayerProperties, PortalItem, PortalSelf, QueryPage, QueryRequest,
    ServiceInfo,
};
use crate::url::{feature_server_root, join};
use async_trait::async_trait;
use mygis_types::{GroupId, ItemId};
use reqwest::header::REFERER;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Default portal (ArcGIS Online).
pub const DEFAULT_PORTAL_URL: &str = "https://www.arcgis.com";

/// Page size for content searches (the sharing API maximum).
const SEARCH_PAGE_SIZE: usize = 100;

/// Token lifetime requested from `generateToken`, in minutes.
const TOKEN_EXPIRATION_MINUTES: &str = "60";

/// How a connection authenticates.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Credentials {
    #[default]
    Anonymous,
    /// An API key, sent as the `token` parameter.
    ApiKey { key: String },
    /// A pre-issued token.
    Token { token: String },
    /// Exchanged for a token through `generateToken` on first use.
    UserPassword { username: String, password: String },
}

impl Credentials {
    /// The username, when the credentials carry one.
    pub fn username(&self) -> Option<&str> {
        match self {
            Credentials::UserPassword { username, .. } => Some(username),
            _ => None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Anonymous => f.write_str("Anonymous"),
            Credentials::ApiKey { .. } => f.write_str("ApiKey(***)"),
            Credentials::Token { .. } => f.write_str("Token(***)"),
            Credentials::UserPassword { username, .. } => {
                write!(f, "UserPassword({username}, ***)")
            }
        }
    }
}

/// Connection settings for a REST portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestPortalConfig {
    /// Portal base URL (e.g. `https://www.arcgis.com` or
    /// `https://gis.example.com/portal`).
    pub portal_url: String,
    #[serde(default)]
    pub credentials: Credentials,
    /// Per-request timeout, in seconds.
    pub timeout_secs: u64,
    /// Verify TLS certificates.
    pub verify_cert: bool,
    /// Referer sent with requests and bound into generated tokens.
    pub referer: String,
}

impl Default for RestPortalConfig {
    fn default() -> Self {
        Self {
            portal_url: DEFAULT_PORTAL_URL.to_string(),
            credentials: Credentials::Anonymous,
            timeout_secs: 60,
            verify_cert: true,
            referer: "mygis".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(rename = "nextStart", default)]
    next_start: i64,
}

/// Portal reached over the ArcGIS REST API.
pub struct RestPortal {
    config: RestPortalConfig,
    client: Client,
    token: RwLock<Option<String>>,
}

impl RestPortal {
    /// Creates a new REST portal connection. No request is made until the
    /// first operation.
    pub fn new(config: RestPortalConfig) -> PortalResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_cert)
            .build()?;

        Ok(Self {
            config,
            client,
            token: RwLock::new(None),
        })
    }

    /// Returns the connection settings.
    pub fn config(&self) -> &RestPortalConfig {
        &self.config
    }

    fn sharing_url(&self, path: &str) -> String {
        join(&join(&self.config.portal_url, "sharing/rest"), path)
    }

    /// Returns the token to attach to requests, generating one if needed.
    async fn token(&self) -> PortalResult<Option<String>> {
        match &self.config.credentials {
            Credentials::Anonymous => Ok(None),
            Credentials::ApiKey { key } => Ok(Some(key.clone())),
            Credentials::Token { token } => Ok(Some(token.clone())),
            Credentials::UserPassword { username, password } => {
                if let Some(token) = self.token.read().await.as_ref() {
                    return Ok(Some(token.clone()));
                }
                let token = self.generate_token(username, password).await?;
                *self.token.write().await = Some(token.clone());
                Ok(Some(token))
            }
        }
    }

    async fn generate_token(&self, username: &str, password: &str) -> PortalResult<String> {
        debug!(portal = %self.config.portal_url, username, "Generating portal token");

        let response = self
            .client
            .post(self.sharing_url("generateToken"))
            .header(REFERER, &self.config.referer)
            .form(&[
                ("username", username),
                ("password", password),
                ("client", "referer"),
                ("referer", self.config.referer.as_str()),
                ("expiration", TOKEN_EXPIRATION_MINUTES),
                ("f", "json"),
            ])
            .send()
            .await
            .map_err(|e| PortalError::Network(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(PortalError::Auth(format!("token request failed: {error}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| PortalError::Auth(format!("failed to parse token response: {e}")))?;
        let body = check_error(body).map_err(|e| PortalError::Auth(e.to_string()))?;
        let token: TokenResponse = serde_json::from_value(body)
            .map_err(|e| PortalError::Auth(format!("token missing from response: {e}")))?;

        info!(portal = %self.config.portal_url, username, "Portal token generated");
        Ok(token.token)
    }

    /// GET a REST resource as JSON (`f=json` and the token are added).
    async fn request_json(&self, url: &str, params: &[(&str, &str)]) -> PortalResult<Value> {
        let mut query: Vec<(&str, String)> =
            params.iter().map(|(k, v)| (*k, (*v).to_string())).collect();
        if !params.iter().any(|(k, _)| *k == "f") {
            query.push(("f", "json".to_string()));
        }
        if let Some(token) = self.token().await? {
            query.push(("token", token));
        }

        debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .header(REFERER, &self.config.referer)
            .query(&query)
            .send()
            .await
            .map_err(|e| PortalError::Network(format!("GET {url} failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PortalError::Network(format!("reading {url} failed: {e}")))?;

        if !status.is_success() {
            return Err(PortalError::Api {
                code: i64::from(status.as_u16()),
                message: truncate(&body, 300),
            });
        }

        let value: Value = serde_json::from_str(&body)?;
        check_error(value)
    }

    async fn search_all(&self, query: &str, max_items: usize) -> PortalResult<Vec<PortalItem>> {
        let url = self.sharing_url("search");
        let mut items = Vec::new();
        let mut start: i64 = 1;

        while items.len() < max_items {
            let num = SEARCH_PAGE_SIZE.min(max_items - items.len()).to_string();
            let start_param = start.to_string();
            let body = self
                .request_json(
                    &url,
                    &[("q", query), ("start", &start_param), ("num", &num)],
                )
                .await?;
            let page: SearchResponse = serde_json::from_value(body)?;
            for result in page.results {
                items.push(PortalItem::from_json(result)?);
            }
            if page.next_start <= 0 {
                break;
            }
            start = page.next_start;
        }

        items.truncate(max_items);
        Ok(items)
    }

    async fn open_root(
        &self,
        url: &str,
        item_id: Option<ItemId>,
        title: Option<String>,
    ) -> PortalResult<ServiceInfo> {
        let root = feature_server_root(url)?;
        let properties = LayerProperties::from_value(self.request_json(&root, &[]).await?);
        let listing = self.request_json(&join(&root, "layers"), &[]).await?;

        let collect = |key: &str| -> Vec<LayerInfo> {
            listing
                .get(key)
                .and_then(Value::as_array)
                .map(|entries| {
                    entries
                        .iter()
                        .map(|entry| {
                            let properties = LayerProperties::from_value(entry.clone());
                            let id = properties.id();
                            let layer_url = match id {
                                Some(id) => join(&root, &id.to_string()),
                                None => root.clone(),
                            };
                            LayerInfo::new(layer_url, id, properties)
                        })
                        .collect()
                })
                .unwrap_or_default()
        };

        let layers = collect("layers");
        let tables = collect("tables");
        debug!(url = %root, layers = layers.len(), tables = tables.len(), "Opened feature service");

        Ok(ServiceInfo {
            item_id,
            title,
            url: root.clone(),
            properties,
            layers,
            tables,
        })
    }
}

#[async_trait]
impl Portal for RestPortal {
    fn portal_url(&self) -> &str {
        &self.config.portal_url
    }

    async fn get_item(&self, id: &ItemId) -> PortalResult<Option<PortalItem>> {
        let url = self.sharing_url(&format!("content/items/{id}"));
        match self.request_json(&url, &[]).await {
            Ok(body) => Ok(Some(PortalItem::from_json(body)?)),
            Err(e) if e.is_not_found() => {
                debug!(item_id = %id, error = %e, "Item not found");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn open_service(&self, item: &PortalItem) -> PortalResult<ServiceInfo> {
        let url = item
            .url
            .as_deref()
            .ok_or_else(|| PortalError::NotFound(format!("item {} has no service URL", item.id)))?;
        self.open_root(url, Some(item.id.clone()), Some(item.title.clone()))
            .await
    }

    async fn open_service_url(&self, url: &str) -> PortalResult<ServiceInfo> {
        self.open_root(url, None, None).await
    }

    async fn group_items(&self, group: &GroupId) -> PortalResult<Vec<PortalItem>> {
        self.search_all(&format!("group:{group}"), usize::MAX).await
    }

    async fn search_items(&self, query: &str, max_items: usize) -> PortalResult<Vec<PortalItem>> {
        self.search_all(query, max_items).await
    }

    async fn query_count(&self, layer: &LayerInfo, where_clause: &str) -> PortalResult<u64> {
        let body = self
            .request_json(
                &join(&layer.url, "query"),
                &[("where", where_clause), ("returnCountOnly", "true")],
            )
            .await?;
        body.get("count")
            .and_then(value_as_i64)
            .and_then(|c| u64::try_from(c).ok())
            .ok_or_else(|| PortalError::UnexpectedResponse("count missing from query".to_string()))
    }

    async fn query_page(
        &self,
        layer: &LayerInfo,
        request: &QueryRequest,
    ) -> PortalResult<QueryPage> {
        let out_fields = request.out_fields_param();
        let offset = request.offset.map(|o| o.to_string());
        let limit = request.limit.map(|l| l.to_string());

        let mut params: Vec<(&str, &str)> = vec![
            ("where", request.where_clause.as_str()),
            ("outFields", out_fields.as_str()),
            ("returnGeometry", "false"),
        ];
        if let Some(offset) = offset.as_deref() {
            params.push(("resultOffset", offset));
        }
        if let Some(limit) = limit.as_deref() {
            params.push(("resultRecordCount", limit));
        }

        let body = self.request_json(&join(&layer.url, "query"), &params).await?;
        let features = body
            .get("features")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                PortalError::UnexpectedResponse("features missing from query".to_string())
            })?;

        let rows = features
            .iter()
            .map(|f| {
                f.get("attributes")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_else(Map::new)
            })
            .collect();

        Ok(QueryPage {
            rows,
            exceeded_transfer_limit: body
                .get("exceededTransferLimit")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }

    async fn get_json(&self, url: &str, params: &[(&str, &str)]) -> PortalResult<Value> {
        self.request_json(url, params).await
    }

    async fn portal_self(&self) -> PortalResult<PortalSelf> {
        let body = self.request_json(&self.sharing_url("portals/self"), &[]).await?;
        Ok(PortalSelf {
            portal_name: body.get("name").and_then(Value::as_str).map(str::to_string),
            username: body
                .get("user")
                .and_then(|u| u.get("username"))
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

/// Turns a `{"error": {...}}` body into `PortalError::Api`.
fn check_error(body: Value) -> PortalResult<Value> {
    let Some(error) = body.get("error").filter(|e| e.is_object()) else {
        return Ok(body);
    };
    let code = error.get("code").and_then(value_as_i64).unwrap_or(500);
    let mut message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    if let Some(details) = error.get("details").and_then(Value::as_array) {
        let details: Vec<&str> = details.iter().filter_map(Value::as_str).collect();
        if !details.is_empty() {
            message = format!("{message} ({})", details.join("; "));
        }
    }
    Err(PortalError::Api { code, message })
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn check_error_passes_normal_bodies() {
        let body = json!({"count": 3});
        assert_eq!(check_error(body.clone()).unwrap(), body);
    }

    #[test]
    fn check_error_maps_error_object() {
        let body = json!({"error": {"code": 498, "message": "Invalid token.", "details": ["expired"]}});
        match check_error(body) {
            Err(PortalError::Api { code, message }) => {
                assert_eq!(code, 498);
                assert_eq!(message, "Invalid token. (expired)");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn credentials_debug_hides_secrets() {
        let creds = Credentials::UserPassword {
            username: "admin".into(),
            password: "hunter2".into(),
        };
        let debug = format!("{creds:?}");
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn truncate_long_bodies() {
        assert_eq!(truncate("abcdef", 3), "abc…");
        assert_eq!(truncate("ab", 3), "ab");
    }
}
