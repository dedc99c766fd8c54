//! Opening the host and guest services of an item pair.

use mygis_portal::{Portal, PortalItem, ServiceInfo};
use mygis_types::ItemId;
use tracing::debug;

pub(crate) struct OpenedPair {
    pub host_item: PortalItem,
    pub host: ServiceInfo,
    pub guest: ServiceInfo,
}

/// Resolves both items and opens their services. Any failure is returned as
/// the message for an `error` payload.
pub(crate) async fn open_pair(
    host: &dyn Portal,
    guest: &dyn Portal,
    host_item_id: &str,
    guest_item_id: &str,
) -> Result<OpenedPair, String> {
    let (host_id, guest_id) = match (ItemId::parse(host_item_id), ItemId::parse(guest_item_id)) {
        (Ok(h), Ok(g)) => (h, g),
        (Err(e), _) | (_, Err(e)) => return Err(e.to_string()),
    };

    let host_item = fetch_item(host, &host_id).await?;
    let guest_item = fetch_item(guest, &guest_id).await?;
    let (Some(host_item), Some(guest_item)) = (host_item, guest_item) else {
        return Err("One or both items not found".to_string());
    };

    let host_service = host
        .open_service(&host_item)
        .await
        .map_err(|e| format!("Failed to open host feature service: {e}"))?;
    let guest_service = guest
        .open_service(&guest_item)
        .await
        .map_err(|e| format!("Failed to open guest feature service: {e}"))?;

    debug!(
        host_url = %host_service.url,
        guest_url = %guest_service.url,
        "Opened service pair"
    );
    Ok(OpenedPair {
        host_item,
        host: host_service,
        guest: guest_service,
    })
}

async fn fetch_item(portal: &dyn Portal, id: &ItemId) -> Result<Option<PortalItem>, String> {
    portal
        .get_item(id)
        .await
        .map_err(|e| format!("Failed to fetch item {id} from {}: {e}", portal.portal_url()))
}
