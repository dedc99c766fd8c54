//! `replicas list` and `replicas sync-enabled`.

use crate::app::UsageError;
use crate::cli::{ReplicasListArgs, SyncEnabledArgs};
use anyhow::Context;
use mygis_config::Config;
use mygis_portal::{
    format_replica_table, list_replicas, list_sync_enabled_replicas, OwnerFilter, Portal,
};
use std::io::Write;

/// Config keys that may name the service for `replicas list`.
const SERVICE_KEYS: &[&str] = &["service", "service_url", "feature_service"];

/// Config keys that may hold the owner filter for `replicas sync-enabled`.
const OWNER_KEYS: &[&str] = &["search_owner", "owner"];

fn first_config_value(config: &Config, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| config.get_str(key).filter(|v| !v.trim().is_empty()))
}

pub async fn list(
    portal: &dyn Portal,
    config: &Config,
    args: &ReplicasListArgs,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let service = args
        .service
        .clone()
        .or_else(|| args.service_opt.clone())
        .or_else(|| first_config_value(config, SERVICE_KEYS))
        .ok_or_else(|| {
            UsageError(
                "a service is required (positional, --service, MYGIS_SERVICE, or config key \
                 'service'/'service_url')"
                    .to_string(),
            )
        })?;

    let replicas = list_replicas(portal, &service)
        .await
        .with_context(|| format!("listing replicas of {service}"))?;

    if args.json {
        writeln!(out, "{}", serde_json::to_string(&replicas)?)?;
    } else if args.quiet || replicas.is_empty() {
        writeln!(out, "Found {} replicas", replicas.len())?;
    } else {
        writeln!(out, "{}", format_replica_table(&replicas))?;
    }
    Ok(())
}

pub async fn sync_enabled(
    portal: &dyn Portal,
    config: &Config,
    args: &SyncEnabledArgs,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let owner = args
        .owner
        .clone()
        .or_else(|| first_config_value(config, OWNER_KEYS))
        .map_or(OwnerFilter::Any, |o| OwnerFilter::parse(&o));

    let services = list_sync_enabled_replicas(portal, args.query.as_deref(), &owner, args.max_items)
        .await
        .context("searching for sync-enabled services")?;

    if args.json {
        writeln!(out, "{}", serde_json::to_string(&services)?)?;
        return Ok(());
    }

    let total: usize = services.iter().map(|s| s.replicas.len()).sum();
    if !args.quiet {
        for service in &services {
            writeln!(
                out,
                "{} ({}): {} replica(s)",
                service.title,
                service.item_id,
                service.replicas.len()
            )?;
        }
    }
    writeln!(
        out,
        "Services with sync enabled: {}; total replicas: {total}",
        services.len()
    )?;
    Ok(())
}
