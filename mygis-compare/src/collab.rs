//! Whole-group collaboration checks.

use crate::metadata::{compare_items, ItemComparison, ItemOptions};
use crate::pairing::pair_group_items;
use mygis_portal::Portal;
use mygis_types::GroupId;
use tracing::{debug, info};

/// Options for [`check_collaboration_groups`].
#[derive(Debug, Clone)]
pub struct GroupOptions {
    /// Only pair feature-service items.
    pub strict_type: bool,
    pub verbose: bool,
}

impl Default for GroupOptions {
    fn default() -> Self {
        Self {
            strict_type: true,
            verbose: true,
        }
    }
}

/// Pairs the items shared to two collaboration groups and compares every
/// pair, in host-group order.
pub async fn check_collaboration_groups(
    host: &dyn Portal,
    guest: &dyn Portal,
    host_group: &GroupId,
    guest_group: &GroupId,
    options: &GroupOptions,
) -> Vec<ItemComparison> {
    let pairs = pair_group_items(host, guest, host_group, guest_group, options.strict_type).await;
    if options.verbose {
        info!(count = pairs.len(), host_group = %host_group, guest_group = %guest_group, "Matched item pairs between groups");
    } else {
        debug!(count = pairs.len(), host_group = %host_group, guest_group = %guest_group, "Matched item pairs between groups");
    }

    let item_options = ItemOptions {
        verbose: options.verbose,
    };
    let mut results = Vec::with_capacity(pairs.len());
    for pair in &pairs {
        results.push(
            compare_items(
                host,
                guest,
                pair.host.id.as_str(),
                pair.guest.id.as_str(),
                &item_options,
            )
            .await,
        );
    }
    results
}
