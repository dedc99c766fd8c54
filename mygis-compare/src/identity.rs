//! Layer/table identity across portals.

use mygis_portal::LayerInfo;
use mygis_types::LayerKey;
use tracing::warn;

/// Derives the cross-portal key of a layer or table.
///
/// Priority: declared non-empty `name`, then `id` / `layerId`, then the id
/// the service listing assigned, then a fresh ephemeral token. Missing or
/// wrongly-typed properties fall through to the next tier.
pub fn layer_key(layer: &LayerInfo) -> LayerKey {
    if let Some(name) = layer.properties.name() {
        return LayerKey::Named(name.to_string());
    }
    if let Some(id) = layer.properties.id().or(layer.listed_id) {
        return LayerKey::Indexed(id);
    }
    LayerKey::ephemeral()
}

/// Keys every layer of a collection, keeping listing order.
///
/// When two layers produce the same key the later one replaces the earlier
/// one in place, so a key denotes at most one layer.
pub fn keyed_layers(layers: &[LayerInfo]) -> Vec<(LayerKey, &LayerInfo)> {
    let mut keyed: Vec<(LayerKey, &LayerInfo)> = Vec::with_capacity(layers.len());
    for layer in layers {
        let key = layer_key(layer);
        match keyed.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => {
                warn!(key = %key, url = %layer.url, "Duplicate layer key; keeping the later layer");
                slot.1 = layer;
            }
            None => keyed.push((key, layer)),
        }
    }
    keyed
}

/// Name shown for a compared layer: its declared name, else its key.
pub(crate) fn entry_name(key: &LayerKey, layer: &LayerInfo) -> String {
    layer
        .properties
        .name()
        .map_or_else(|| key.to_string(), str::to_string)
}

/// Looks up a key in a keyed collection.
pub(crate) fn find<'a>(keyed: &[(LayerKey, &'a LayerInfo)], key: &LayerKey) -> Option<&'a LayerInfo> {
    keyed.iter().find(|(k, _)| k == key).map(|(_, layer)| *layer)
}
