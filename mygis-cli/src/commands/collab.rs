//! `collab items`, `collab groups` and `collab records`.

use crate::app::UsageError;
use crate::cli::{split_list, GroupsArgs, ItemsArgs, RecordsArgs};
use mygis_compare::report::{
    render_group_results, render_item_comparison, render_record_comparison,
};
use mygis_compare::{
    check_collaboration_groups, compare_items, compare_records, GroupOptions, ItemOptions,
    RecordOptions,
};
use mygis_portal::Portal;
use mygis_types::GroupId;
use serde::Serialize;
use std::io::Write;

fn emit<T: Serialize>(
    out: &mut dyn Write,
    json: bool,
    value: &T,
    text: impl FnOnce() -> String,
) -> anyhow::Result<()> {
    if json {
        writeln!(out, "{}", serde_json::to_string(value)?)?;
    } else {
        writeln!(out, "{}", text())?;
    }
    Ok(())
}

pub async fn items(
    host: &dyn Portal,
    guest: &dyn Portal,
    args: &ItemsArgs,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let options = ItemOptions { verbose: !args.quiet };
    let result = compare_items(host, guest, &args.host_item, &args.guest_item, &options).await;
    emit(out, args.json, &result, || render_item_comparison(&result))
}

pub async fn groups(
    host: &dyn Portal,
    guest: &dyn Portal,
    args: &GroupsArgs,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let host_group = GroupId::parse(&args.host_group)
        .map_err(|e| UsageError(format!("--host-group: {e}")))?;
    let guest_group = GroupId::parse(&args.guest_group)
        .map_err(|e| UsageError(format!("--guest-group: {e}")))?;
    let options = GroupOptions {
        strict_type: !args.no_strict_type,
        verbose: !args.quiet,
    };
    let results = check_collaboration_groups(host, guest, &host_group, &guest_group, &options).await;
    emit(out, args.json, &results, || render_group_results(&results))
}

pub async fn records(
    host: &dyn Portal,
    guest: &dyn Portal,
    args: &RecordsArgs,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let options = RecordOptions {
        where_clause: args.where_clause.clone(),
        ignore_fields: split_list(&args.ignore_fields),
        layer_keys: split_list(&args.layer_keys),
        chunk_size: args.chunk_size,
        verbose: !args.quiet,
    };
    let result = compare_records(host, guest, &args.host_item, &args.guest_item, &options).await;
    emit(out, args.json, &result, || render_record_comparison(&result))
}
