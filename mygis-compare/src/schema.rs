//! Comparable field sets and cross-side field reconciliation.

use mygis_portal::LayerInfo;
use serde::Serialize;
use std::collections::HashSet;

/// Field names that are never compared (lowercase).
pub const BUILTIN_IGNORED_FIELDS: [&str; 7] = [
    "shape",
    "shape_length",
    "shape_area",
    "shape.len",
    "shape.area",
    "shape__length",
    "shape__area",
];

/// Attribute fields of `layer` that take part in a record comparison.
///
/// Drops (case-insensitively) the caller's `ignore` names, the built-in
/// shape fields, the declared object-id, global-id and shape fields, and any
/// field typed as geometry, OID or GlobalID. When nothing remains the
/// object-id field is used alone; when there is none the result is empty.
pub fn comparable_fields(layer: &LayerInfo, ignore: &[String]) -> Vec<String> {
    let properties = &layer.properties;

    let mut excluded: HashSet<String> = ignore.iter().map(|f| f.trim().to_lowercase()).collect();
    excluded.extend(BUILTIN_IGNORED_FIELDS.iter().map(|f| (*f).to_string()));
    excluded.extend(properties.object_id_field().map(str::to_lowercase));
    excluded.extend(properties.global_id_field().map(str::to_lowercase));
    excluded.extend(properties.shape_field_names().into_iter().map(str::to_lowercase));

    let fields = properties.fields();
    let mut seen = HashSet::new();
    let comparable: Vec<String> = fields
        .iter()
        .filter(|f| !f.is_geometry() && !f.is_object_id() && !f.is_global_id())
        .filter(|f| !excluded.contains(&f.name.to_lowercase()))
        .filter(|f| seen.insert(f.name.to_lowercase()))
        .map(|f| f.name.clone())
        .collect();

    if !comparable.is_empty() {
        return comparable;
    }

    properties
        .object_id_field()
        .map(str::to_string)
        .or_else(|| {
            fields
                .iter()
                .find(|f| f.is_object_id())
                .map(|f| f.name.clone())
        })
        .into_iter()
        .collect()
}

/// Host fields paired with the guest's spelling of the same field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciledFields {
    /// Logical field order (host spelling).
    pub host: Vec<String>,
    /// Same fields, guest spelling, same order.
    pub guest: Vec<String>,
}

impl ReconciledFields {
    pub fn len(&self) -> usize {
        self.host.len()
    }

    pub fn is_empty(&self) -> bool {
        self.host.is_empty()
    }
}

/// Host fields the guest layer does not declare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingFields(pub Vec<String>);

/// Resolves every host field on the guest layer (case-insensitive).
pub fn reconcile_fields(
    host_fields: &[String],
    guest: &LayerInfo,
) -> Result<ReconciledFields, MissingFields> {
    let guest_fields = guest.properties.fields();
    let mut guest_names = Vec::with_capacity(host_fields.len());
    let mut missing = Vec::new();

    for name in host_fields {
        match guest_fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
        {
            Some(field) => guest_names.push(field.name.clone()),
            None => missing.push(name.clone()),
        }
    }

    if missing.is_empty() {
        Ok(ReconciledFields {
            host: host_fields.to_vec(),
            guest: guest_names,
        })
    } else {
        Err(MissingFields(missing))
    }
}
