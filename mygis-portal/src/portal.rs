//! Portal abstraction trait.
//!
//! Defines the operations the comparison engine and the replica tools need
//! from a portal and its feature services. Implementations: [`RestPortal`]
//! (ArcGIS REST API) and [`MemoryPortal`] (fixtures).
//!
//! [`RestPortal`]: crate::rest::RestPortal
//! [`MemoryPortal`]: crate::memory::MemoryPortal

use crate::error::PortalResult;
use crate::service::{LayerInfo, PortalItem, PortalSelf, QueryPage, QueryRequest, ServiceInfo};
use async_trait::async_trait;
use mygis_types::{GroupId, ItemId};
use serde_json::Value;

/// Abstract portal interface.
#[async_trait]
pub trait Portal: Send + Sync {
    /// Base URL of the portal (used in reports and logs).
    fn portal_url(&self) -> &str;

    /// Fetches an item. `Ok(None)` when it does not exist or is not visible.
    async fn get_item(&self, id: &ItemId) -> PortalResult<Option<PortalItem>>;

    /// Opens the feature service behind an item.
    async fn open_service(&self, item: &PortalItem) -> PortalResult<ServiceInfo>;

    /// Opens a feature service by URL (root or layer URL).
    async fn open_service_url(&self, url: &str) -> PortalResult<ServiceInfo>;

    /// Lists the items shared to a group.
    async fn group_items(&self, group: &GroupId) -> PortalResult<Vec<PortalItem>>;

    /// Runs a content search, returning at most `max_items` results.
    async fn search_items(&self, query: &str, max_items: usize) -> PortalResult<Vec<PortalItem>>;

    /// Count-only query.
    async fn query_count(&self, layer: &LayerInfo, where_clause: &str) -> PortalResult<u64>;

    /// Attribute query (one page, or everything when the request is unbounded).
    async fn query_page(&self, layer: &LayerInfo, request: &QueryRequest)
        -> PortalResult<QueryPage>;

    /// Raw JSON GET against a REST resource (e.g. `{FeatureServer}/replicas`).
    async fn get_json(&self, url: &str, params: &[(&str, &str)]) -> PortalResult<Value>;

    /// Information about the portal and the signed-in user.
    async fn portal_self(&self) -> PortalResult<PortalSelf>;
}
