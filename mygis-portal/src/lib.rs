//! Portal and feature-service access for mygis.
//!
//! - [`Portal`]: the operations the comparison engine needs from a portal
//! - [`RestPortal`]: ArcGIS REST implementation (reqwest)
//! - [`MemoryPortal`]: in-memory implementation for tests and fixtures
//! - [`replicas`]: sync replica listing

pub mod error;
pub mod memory;
pub mod portal;
pub mod replicas;
pub mod rest;
pub mod service;
pub mod url;

pub use error::{PortalError, PortalResult};
pub use memory::{MemoryLayer, MemoryPortal, MemoryService};
pub use portal::Portal;
pub use replicas::{
    epoch_to_iso, format_replica_table, list_replicas, list_sync_enabled_replicas, OwnerFilter,
    ReplicaRecord, SyncServiceReplicas,
};
pub use rest::{Credentials, RestPortal, RestPortalConfig, DEFAULT_PORTAL_URL};
pub use service::{
    FieldDescriptor, LayerInfo, LayerProperties, PortalItem, PortalSelf, QueryPage, QueryRequest,
    ServiceInfo,
};
pub use url::feature_server_root;
