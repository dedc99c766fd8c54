//! In-memory [`Portal`] for tests and offline fixtures.
//!
//! Services, layers and rows are declared with small builders. Queries
//! support `1=1` (or an empty clause) and single `FIELD = value` equality
//! clauses, `resultOffset`/`resultRecordCount` paging with a
//! `maxRecordCount` cap, and case-insensitive `outFields` projection.
//! Every call is recorded so tests can assert which requests were made.

use crate::error::{PortalError, PortalResult};
use crate::portal::Portal;
use crate::service::{
    LayerInfo, LayerProperties, PortalItem, PortalSelf, QueryPage, QueryRequest, ServiceInfo,
    OID_FIELD_TYPE,
};
use crate::url::{feature_server_root, join};
use async_trait::async_trait;
use mygis_types::{AttrValue, GroupId, ItemId};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;

/// A layer or table with its rows.
#[derive(Debug, Clone)]
pub struct MemoryLayer {
    id: i64,
    properties: Map<String, Value>,
    rows: Vec<Map<String, Value>>,
    query_error: Option<String>,
    ignores_offset: bool,
}

impl MemoryLayer {
    /// A layer with a declared `id` and `name` and no fields.
    pub fn new(id: i64, name: &str) -> Self {
        let mut properties = Map::new();
        properties.insert("id".into(), json!(id));
        properties.insert("name".into(), json!(name));
        properties.insert("fields".into(), json!([]));
        Self {
            id,
            properties,
            rows: Vec::new(),
            query_error: None,
            ignores_offset: false,
        }
    }

    /// Declares a field.
    #[must_use]
    pub fn field(mut self, name: &str, field_type: &str) -> Self {
        if let Some(Value::Array(fields)) = self.properties.get_mut("fields") {
            fields.push(json!({"name": name, "type": field_type}));
        }
        self
    }

    /// Declares an `esriFieldTypeOID` field and names it in `objectIdField`.
    #[must_use]
    pub fn object_id_field(self, name: &str) -> Self {
        self.field(name, OID_FIELD_TYPE)
            .property("objectIdField", json!(name))
    }

    /// Sets a raw layer property.
    #[must_use]
    pub fn property(mut self, key: &str, value: Value) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }

    /// Removes a raw layer property (e.g. `name`, to exercise id fallbacks).
    #[must_use]
    pub fn without_property(mut self, key: &str) -> Self {
        self.properties.remove(key);
        self
    }

    /// Advertises `resultOffset` paging with the given server page limit.
    #[must_use]
    pub fn paginated(self, max_record_count: i64) -> Self {
        self.property(
            "advancedQueryCapabilities",
            json!({"supportsPagination": true}),
        )
        .property("maxRecordCount", json!(max_record_count))
    }

    /// Serves every page from the first row, like a server that ignores
    /// `resultOffset`.
    #[must_use]
    pub fn ignoring_offset(mut self) -> Self {
        self.ignores_offset = true;
        self
    }

    /// Sets `editingInfo.lastEditDate` (epoch milliseconds).
    #[must_use]
    pub fn last_edit(self, epoch_ms: i64) -> Self {
        self.property("editingInfo", json!({"lastEditDate": epoch_ms}))
    }

    /// Adds one row. Non-object values are ignored.
    #[must_use]
    pub fn row(mut self, attributes: Value) -> Self {
        if let Value::Object(map) = attributes {
            self.rows.push(map);
        }
        self
    }

    /// Adds several rows.
    #[must_use]
    pub fn rows(self, rows: impl IntoIterator<Item = Value>) -> Self {
        rows.into_iter().fold(self, MemoryLayer::row)
    }

    /// Makes every count and attribute query against this layer fail.
    #[must_use]
    pub fn failing_queries(mut self, message: &str) -> Self {
        self.query_error = Some(message.to_string());
        self
    }

    fn info(&self, root: &str) -> LayerInfo {
        LayerInfo::new(
            join(root, &self.id.to_string()),
            Some(self.id),
            LayerProperties::new(self.properties.clone()),
        )
    }

    fn filtered(&self, where_clause: &str) -> PortalResult<Vec<&Map<String, Value>>> {
        if let Some(message) = &self.query_error {
            return Err(PortalError::Api {
                code: 500,
                message: message.clone(),
            });
        }
        let filter = WhereFilter::parse(where_clause)?;
        Ok(self.rows.iter().filter(|row| filter.matches(row)).collect())
    }
}

/// A feature service: root properties, layers, tables and replicas.
#[derive(Debug, Clone)]
pub struct MemoryService {
    url: String,
    properties: Map<String, Value>,
    layers: Vec<MemoryLayer>,
    tables: Vec<MemoryLayer>,
    replicas: Option<Value>,
    open_error: Option<String>,
}

impl MemoryService {
    /// A service rooted at `url` (a `…/FeatureServer` URL).
    pub fn new(url: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            properties: Map::new(),
            layers: Vec::new(),
            tables: Vec::new(),
            replicas: None,
            open_error: None,
        }
    }

    #[must_use]
    pub fn layer(mut self, layer: MemoryLayer) -> Self {
        self.layers.push(layer);
        self
    }

    #[must_use]
    pub fn table(mut self, table: MemoryLayer) -> Self {
        self.tables.push(table);
        self
    }

    /// Sets a raw service property.
    #[must_use]
    pub fn property(mut self, key: &str, value: Value) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }

    #[must_use]
    pub fn sync_enabled(self, enabled: bool) -> Self {
        self.property("syncEnabled", json!(enabled))
    }

    /// Body returned by `{root}/replicas`.
    #[must_use]
    pub fn replicas(mut self, body: Value) -> Self {
        self.replicas = Some(body);
        self
    }

    /// Makes opening this service fail.
    #[must_use]
    pub fn failing_open(mut self, message: &str) -> Self {
        self.open_error = Some(message.to_string());
        self
    }

    /// The service root URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn all_layers(&self) -> impl Iterator<Item = &MemoryLayer> {
        self.layers.iter().chain(self.tables.iter())
    }
}

/// In-memory portal.
#[derive(Debug, Default)]
pub struct MemoryPortal {
    url: String,
    username: Option<String>,
    items: Vec<PortalItem>,
    services: Vec<MemoryService>,
    groups: HashMap<String, Vec<ItemId>>,
    failing_groups: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
}

impl MemoryPortal {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Self::default()
        }
    }

    /// Sets the signed-in username reported by `portal_self`.
    #[must_use]
    pub fn with_user(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    /// Adds an item. Items added later replace earlier ones with the same id.
    #[must_use]
    pub fn with_item(mut self, item: PortalItem) -> Self {
        self.items.retain(|existing| existing.id != item.id);
        self.items.push(item);
        self
    }

    /// Adds a service (reachable through items whose URL points at it).
    #[must_use]
    pub fn with_service(mut self, service: MemoryService) -> Self {
        self.services.push(service);
        self
    }

    /// Shares items to a group (order is preserved).
    #[must_use]
    pub fn with_group(mut self, group: &str, items: &[&ItemId]) -> Self {
        self.groups.insert(
            group.to_string(),
            items.iter().map(|id| (*id).clone()).collect(),
        );
        self
    }

    /// Makes listing a group fail.
    #[must_use]
    pub fn with_failing_group(mut self, group: &str, message: &str) -> Self {
        self.failing_groups
            .insert(group.to_string(), message.to_string());
        self
    }

    /// Requests made so far, oldest first.
    pub fn requests(&self) -> Vec<String> {
        self.lock_requests().clone()
    }

    /// Number of count and attribute queries made so far.
    pub fn query_count_made(&self) -> usize {
        self.lock_requests()
            .iter()
            .filter(|r| r.starts_with("query"))
            .count()
    }

    fn lock_requests(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, request: String) {
        self.lock_requests().push(request);
    }

    fn find_service(&self, url: &str) -> PortalResult<&MemoryService> {
        let root = feature_server_root(url)?;
        self.services
            .iter()
            .find(|s| s.url.eq_ignore_ascii_case(&root))
            .ok_or_else(|| PortalError::NotFound(format!("service {root}")))
    }

    fn find_layer(&self, layer: &LayerInfo) -> PortalResult<&MemoryLayer> {
        self.services
            .iter()
            .flat_map(|s| s.all_layers().map(move |l| (s, l)))
            .find(|(s, l)| join(&s.url, &l.id.to_string()).eq_ignore_ascii_case(&layer.url))
            .map(|(_, l)| l)
            .ok_or_else(|| PortalError::NotFound(format!("layer {}", layer.url)))
    }

    fn open(&self, url: &str, item: Option<&PortalItem>) -> PortalResult<ServiceInfo> {
        let service = self.find_service(url)?;
        if let Some(message) = &service.open_error {
            return Err(PortalError::Api {
                code: 500,
                message: message.clone(),
            });
        }
        Ok(ServiceInfo {
            item_id: item.map(|i| i.id.clone()),
            title: item.map(|i| i.title.clone()),
            url: service.url.clone(),
            properties: LayerProperties::new(service.properties.clone()),
            layers: service.layers.iter().map(|l| l.info(&service.url)).collect(),
            tables: service.tables.iter().map(|t| t.info(&service.url)).collect(),
        })
    }
}

#[async_trait]
impl Portal for MemoryPortal {
    fn portal_url(&self) -> &str {
        &self.url
    }

    async fn get_item(&self, id: &ItemId) -> PortalResult<Option<PortalItem>> {
        self.record(format!("get_item {id}"));
        Ok(self.items.iter().find(|i| &i.id == id).cloned())
    }

    async fn open_service(&self, item: &PortalItem) -> PortalResult<ServiceInfo> {
        self.record(format!("open_service {}", item.id));
        let url = item
            .url
            .as_deref()
            .ok_or_else(|| PortalError::NotFound(format!("item {} has no service URL", item.id)))?;
        self.open(url, Some(item))
    }

    async fn open_service_url(&self, url: &str) -> PortalResult<ServiceInfo> {
        self.record(format!("open_service_url {url}"));
        self.open(url, None)
    }

    async fn group_items(&self, group: &GroupId) -> PortalResult<Vec<PortalItem>> {
        self.record(format!("group_items {group}"));
        if let Some(message) = self.failing_groups.get(group.as_str()) {
            return Err(PortalError::Api {
                code: 403,
                message: message.clone(),
            });
        }
        let ids = self
            .groups
            .get(group.as_str())
            .ok_or_else(|| PortalError::NotFound(format!("group {group}")))?;
        Ok(ids
            .iter()
            .filter_map(|id| self.items.iter().find(|i| &i.id == id).cloned())
            .collect())
    }

    async fn search_items(&self, query: &str, max_items: usize) -> PortalResult<Vec<PortalItem>> {
        self.record(format!("search_items {query}"));
        let terms = SearchTerm::parse(query);
        Ok(self
            .items
            .iter()
            .filter(|item| terms.iter().all(|t| t.matches(item)))
            .take(max_items)
            .cloned()
            .collect())
    }

    async fn query_count(&self, layer: &LayerInfo, where_clause: &str) -> PortalResult<u64> {
        self.record(format!("query_count {} where={where_clause}", layer.url));
        let rows = self.find_layer(layer)?.filtered(where_clause)?;
        Ok(rows.len() as u64)
    }

    async fn query_page(
        &self,
        layer: &LayerInfo,
        request: &QueryRequest,
    ) -> PortalResult<QueryPage> {
        self.record(format!(
            "query_page {} where={} offset={:?} limit={:?}",
            layer.url, request.where_clause, request.offset, request.limit
        ));
        let memory_layer = self.find_layer(layer)?;
        let rows = memory_layer.filtered(&request.where_clause)?;

        let server_cap = LayerProperties::new(memory_layer.properties.clone())
            .max_record_count()
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| *n > 0);
        let offset = request
            .offset
            .filter(|_| !memory_layer.ignores_offset)
            .and_then(|o| usize::try_from(o).ok())
            .unwrap_or(0)
            .min(rows.len());
        let requested = request.limit.and_then(|l| usize::try_from(l).ok());
        let limit = match (requested, server_cap) {
            (Some(r), Some(cap)) => r.min(cap),
            (Some(r), None) => r,
            (None, Some(cap)) => cap,
            (None, None) => usize::MAX,
        };

        let end = offset.saturating_add(limit).min(rows.len());
        let page = rows[offset..end]
            .iter()
            .map(|row| project(row, &request.out_fields))
            .collect();

        Ok(QueryPage {
            rows: page,
            exceeded_transfer_limit: end < rows.len(),
        })
    }

    async fn get_json(&self, url: &str, _params: &[(&str, &str)]) -> PortalResult<Value> {
        self.record(format!("get_json {url}"));
        let trimmed = url.trim_end_matches('/');
        if let Some(root) = trimmed.strip_suffix("/replicas") {
            let service = self.find_service(root)?;
            return Ok(service
                .replicas
                .clone()
                .unwrap_or_else(|| json!({"replicas": []})));
        }
        let service = self.find_service(trimmed)?;
        Ok(Value::Object(service.properties.clone()))
    }

    async fn portal_self(&self) -> PortalResult<PortalSelf> {
        self.record("portal_self".to_string());
        Ok(PortalSelf {
            portal_name: Some("memory".to_string()),
            username: self.username.clone(),
        })
    }
}

/// Keeps the requested fields (case-insensitive), or the whole row for `*`.
fn project(row: &Map<String, Value>, out_fields: &[String]) -> Map<String, Value> {
    if out_fields.is_empty() || out_fields.iter().any(|f| f == "*") {
        return row.clone();
    }
    out_fields
        .iter()
        .filter_map(|wanted| {
            row.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(wanted))
                .map(|(k, v)| (k.clone(), v.clone()))
        })
        .collect()
}

enum WhereFilter {
    All,
    Equals { field: String, value: AttrValue },
}

impl WhereFilter {
    fn parse(clause: &str) -> PortalResult<Self> {
        let compact: String = clause.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() || compact == "1=1" {
            return Ok(WhereFilter::All);
        }
        let invalid = || PortalError::Api {
            code: 400,
            message: format!("Invalid where clause: {clause}"),
        };
        let (field, literal) = clause.split_once('=').ok_or_else(invalid)?;
        let field = field.trim();
        let literal = literal.trim();
        if field.is_empty() || literal.is_empty() {
            return Err(invalid());
        }
        let value = match literal
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
        {
            Some(text) => Value::String(text.replace("''", "'")),
            None => serde_json::from_str(literal).map_err(|_| invalid())?,
        };
        Ok(WhereFilter::Equals {
            field: field.to_string(),
            value: AttrValue::from_json(&value),
        })
    }

    fn matches(&self, row: &Map<String, Value>) -> bool {
        match self {
            WhereFilter::All => true,
            WhereFilter::Equals { field, value } => row
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(field))
                .is_some_and(|(_, v)| &AttrValue::from_json(v) == value),
        }
    }
}

/// One term of a content search query.
enum SearchTerm {
    Type(String),
    Owner(String),
    Text(String),
}

impl SearchTerm {
    fn parse(query: &str) -> Vec<SearchTerm> {
        let mut terms = Vec::new();
        let mut rest = query.trim();
        while !rest.is_empty() {
            let (token, remaining) = next_token(rest);
            rest = remaining.trim_start();
            if token.eq_ignore_ascii_case("AND") {
                continue;
            }
            let term = match token.split_once(':') {
                Some((key, value)) if key.eq_ignore_ascii_case("type") => {
                    SearchTerm::Type(value.trim_matches('"').to_string())
                }
                Some((key, value)) if key.eq_ignore_ascii_case("owner") => {
                    SearchTerm::Owner(value.trim_matches('"').to_string())
                }
                _ => SearchTerm::Text(token.trim_matches('"').to_string()),
            };
            terms.push(term);
        }
        terms
    }

    fn matches(&self, item: &PortalItem) -> bool {
        match self {
            SearchTerm::Type(t) => item.item_type.eq_ignore_ascii_case(t),
            SearchTerm::Owner(o) => item.owner.as_deref() == Some(o.as_str()),
            SearchTerm::Text(text) => item
                .title
                .to_lowercase()
                .contains(&text.to_lowercase()),
        }
    }
}

/// Splits off the next whitespace-delimited token, keeping quoted runs whole.
fn next_token(input: &str) -> (&str, &str) {
    let mut in_quotes = false;
    for (idx, c) in input.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => return (&input[..idx], &input[idx..]),
            _ => {}
        }
    }
    (input, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: Value) -> Map<String, Value> {
        pairs.as_object().cloned().unwrap()
    }

    #[test]
    fn where_all() {
        assert!(WhereFilter::parse("1=1").unwrap().matches(&row(json!({"A": 1}))));
        assert!(WhereFilter::parse(" 1 = 1 ").unwrap().matches(&row(json!({}))));
        assert!(WhereFilter::parse("").unwrap().matches(&row(json!({}))));
    }

    #[test]
    fn where_equals_text_and_number() {
        let f = WhereFilter::parse("status = 'open'").unwrap();
        assert!(f.matches(&row(json!({"STATUS": "open"}))));
        assert!(!f.matches(&row(json!({"STATUS": "closed"}))));

        let f = WhereFilter::parse("ID=2").unwrap();
        assert!(f.matches(&row(json!({"id": 2.0}))));
        assert!(!f.matches(&row(json!({"id": 3}))));
    }

    #[test]
    fn where_rejects_garbage() {
        assert!(WhereFilter::parse("ID > 3").is_err());
        assert!(WhereFilter::parse("= 3").is_err());
    }

    #[test]
    fn search_terms_keep_quoted_values() {
        let terms = SearchTerm::parse(r#"type:"Feature Service" AND owner:alice"#);
        assert_eq!(terms.len(), 2);
        assert!(matches!(&terms[0], SearchTerm::Type(t) if t == "Feature Service"));
        assert!(matches!(&terms[1], SearchTerm::Owner(o) if o == "alice"));
    }

    #[test]
    fn projection_is_case_insensitive() {
        let r = row(json!({"Name": "a", "ID": 1, "Other": true}));
        let projected = project(&r, &["name".into(), "id".into()]);
        assert_eq!(projected.len(), 2);
        assert_eq!(projected["Name"], json!("a"));
    }
}
