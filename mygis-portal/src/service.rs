//! Feature-service model.
//!
//! Service, layer and item metadata is kept as the raw JSON the portal
//! returned and read through explicit accessors that return `None` for
//! absent or differently-shaped values. Nothing here defaults silently.

use mygis_types::{CollectionKind, ItemId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field type that marks a geometry column.
pub const GEOMETRY_FIELD_TYPE: &str = "esriFieldTypeGeometry";
/// Field type that marks the object-id column.
pub const OID_FIELD_TYPE: &str = "esriFieldTypeOID";
/// Field type that marks the global-id column.
pub const GLOBAL_ID_FIELD_TYPE: &str = "esriFieldTypeGlobalID";

/// A field as declared in layer metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: String,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
        }
    }

    /// Whether the declared type denotes geometry.
    #[must_use]
    pub fn is_geometry(&self) -> bool {
        self.field_type.eq_ignore_ascii_case(GEOMETRY_FIELD_TYPE)
    }

    #[must_use]
    pub fn is_object_id(&self) -> bool {
        self.field_type.eq_ignore_ascii_case(OID_FIELD_TYPE)
    }

    #[must_use]
    pub fn is_global_id(&self) -> bool {
        self.field_type.eq_ignore_ascii_case(GLOBAL_ID_FIELD_TYPE)
    }
}

/// Raw metadata of a service, layer or table with optional-field accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerProperties(Map<String, Value>);

impl LayerProperties {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Wraps a JSON value; anything other than an object becomes empty
    /// properties.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    /// Returns the raw value for `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Follows a path of object keys.
    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.0.get(*first)?;
        for key in rest {
            current = current.as_object()?.get(*key)?;
        }
        Some(current)
    }

    /// Returns a non-empty string property.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Returns an integer property. Integral floats and numeric strings are
    /// accepted since some servers emit ids that way.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        value_as_i64(self.0.get(key)?)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// The first non-empty string among `keys`.
    pub fn first_str(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.get_str(k))
    }

    /// Declared layer name.
    pub fn name(&self) -> Option<&str> {
        self.get_str("name")
    }

    /// Declared layer id (`id`, then `layerId`).
    pub fn id(&self) -> Option<i64> {
        self.get_i64("id").or_else(|| self.get_i64("layerId"))
    }

    /// Declared object-id field name.
    pub fn object_id_field(&self) -> Option<&str> {
        self.first_str(&["objectIdField", "objectIdFieldName"])
    }

    /// Declared global-id field name.
    pub fn global_id_field(&self) -> Option<&str> {
        self.first_str(&["globalIdField", "globalIdFieldName"])
    }

    /// Declared shape/geometry field names (there can be several spellings).
    pub fn shape_field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = ["shapeFieldName", "geometryField", "geometryFieldName"]
            .iter()
            .filter_map(|k| self.get_str(k))
            .collect();
        if let Some(name) = self
            .get("geometryField")
            .and_then(Value::as_object)
            .and_then(|o| o.get("name"))
            .and_then(Value::as_str)
        {
            names.push(name);
        }
        names
    }

    /// Declared fields. Malformed entries are skipped.
    pub fn fields(&self) -> Vec<FieldDescriptor> {
        self.0
            .get("fields")
            .and_then(Value::as_array)
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(|f| serde_json::from_value::<FieldDescriptor>(f.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether the layer advertises `resultOffset` paging.
    pub fn supports_pagination(&self) -> bool {
        self.get_path(&["advancedQueryCapabilities", "supportsPagination"])
            .and_then(Value::as_bool)
            .or_else(|| self.get_bool("supportsPagination"))
            .unwrap_or(false)
    }

    /// `syncEnabled`, if declared.
    pub fn sync_enabled(&self) -> Option<bool> {
        self.get_bool("syncEnabled")
    }

    /// Server-side page limit, if declared.
    pub fn max_record_count(&self) -> Option<i64> {
        self.get_i64("maxRecordCount")
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Reads an integer out of a JSON value, accepting integral floats and
/// numeric strings.
pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A layer or table inside a feature service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerInfo {
    /// REST URL of the layer (`…/FeatureServer/<id>`).
    pub url: String,
    /// Id the service listing assigned, independent of layer properties.
    pub listed_id: Option<i64>,
    pub properties: LayerProperties,
}

impl LayerInfo {
    pub fn new(url: impl Into<String>, listed_id: Option<i64>, properties: LayerProperties) -> Self {
        Self {
            url: url.into(),
            listed_id,
            properties,
        }
    }
}

/// An opened feature service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub item_id: Option<ItemId>,
    pub title: Option<String>,
    /// FeatureServer root URL.
    pub url: String,
    pub properties: LayerProperties,
    pub layers: Vec<LayerInfo>,
    pub tables: Vec<LayerInfo>,
}

impl ServiceInfo {
    /// Layers or tables, by kind.
    pub fn collection(&self, kind: CollectionKind) -> &[LayerInfo] {
        match kind {
            CollectionKind::Layers => &self.layers,
            CollectionKind::Tables => &self.tables,
        }
    }

    /// `syncEnabled` on the service, if declared.
    pub fn sync_enabled(&self) -> Option<bool> {
        self.properties.sync_enabled()
    }
}

/// A portal content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalItem {
    pub id: ItemId,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    /// The complete item JSON as returned by the portal.
    #[serde(skip)]
    pub raw: Map<String, Value>,
}

impl PortalItem {
    pub fn new(id: ItemId, title: impl Into<String>, item_type: impl Into<String>) -> Self {
        let title = title.into();
        let item_type = item_type.into();
        let mut raw = Map::new();
        raw.insert("id".into(), Value::String(id.to_string()));
        raw.insert("title".into(), Value::String(title.clone()));
        raw.insert("type".into(), Value::String(item_type.clone()));
        Self {
            id,
            title,
            item_type,
            url: None,
            owner: None,
            raw,
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.raw.insert("url".into(), Value::String(url.clone()));
        self.url = Some(url);
        self
    }

    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        let owner = owner.into();
        self.raw.insert("owner".into(), Value::String(owner.clone()));
        self.owner = Some(owner);
        self
    }

    /// Sets a raw top-level property (e.g. an origin-id key).
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.raw.insert(key.into(), value);
        self
    }

    /// Builds an item from portal JSON, keeping the raw object.
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        let mut item: PortalItem = serde_json::from_value(value.clone())?;
        if let Value::Object(map) = value {
            item.raw = map;
        }
        Ok(item)
    }

    /// Looks up an item property at top level, then inside the item's
    /// `properties` object. Empty strings and nulls count as absent.
    pub fn property(&self, key: &str) -> Option<&Value> {
        let present = |v: &&Value| !v.is_null() && v.as_str() != Some("");
        self.raw.get(key).filter(present).or_else(|| {
            self.raw
                .get("properties")
                .and_then(Value::as_object)
                .and_then(|props| props.get(key))
                .filter(present)
        })
    }
}

/// A query against a layer: attributes only, geometry never requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub where_clause: String,
    /// Output fields; empty means `*`.
    pub out_fields: Vec<String>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl QueryRequest {
    /// An unbounded query.
    pub fn all(where_clause: impl Into<String>, out_fields: Vec<String>) -> Self {
        Self {
            where_clause: where_clause.into(),
            out_fields,
            offset: None,
            limit: None,
        }
    }

    /// One page of a paginated query.
    pub fn page(
        where_clause: impl Into<String>,
        out_fields: Vec<String>,
        offset: u64,
        limit: u64,
    ) -> Self {
        Self {
            where_clause: where_clause.into(),
            out_fields,
            offset: Some(offset),
            limit: Some(limit),
        }
    }

    /// `outFields` parameter value.
    pub fn out_fields_param(&self) -> String {
        if self.out_fields.is_empty() {
            "*".to_string()
        } else {
            self.out_fields.join(",")
        }
    }
}

/// One page of query results (attribute maps only).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    pub rows: Vec<Map<String, Value>>,
    pub exceeded_transfer_limit: bool,
}

/// Identity information for the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalSelf {
    pub portal_name: Option<String>,
    pub username: Option<String>,
}
