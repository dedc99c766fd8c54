//! Plain-text rendering of comparison results.

use crate::metadata::ItemComparison;
use crate::records::{RecordComparison, RecordDiffRow};
use mygis_types::EntryStatus;
use serde_json::Value;
use std::fmt::{Display, Write};

/// Sample rows shown per side for a record mismatch.
pub const SAMPLE_ROWS: usize = 3;

fn opt<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
}

fn headline(title: Option<&str>, status: impl Display, message: Option<&str>) -> String {
    let mut line = format!("{} -> {status}", title.unwrap_or(""));
    if let Some(message) = message {
        let _ = write!(line, " ({message})");
    }
    line
}

/// Summary line plus one line per entry that is not `ok`.
pub fn render_item_comparison(result: &ItemComparison) -> String {
    let mut out = vec![headline(
        result.title.as_deref(),
        result.status,
        result.message.as_deref(),
    )];
    for entry in result.entries().filter(|e| e.status != EntryStatus::Ok) {
        out.push(format!(
            " - {} '{}' -> {} (counts: {} vs {}, lastEdit: {} vs {})",
            entry.kind.singular(),
            entry.name,
            entry.status,
            opt(entry.host_count),
            opt(entry.guest_count),
            opt(entry.host_last_edit),
            opt(entry.guest_last_edit),
        ));
    }
    out.join("\n")
}

/// One block per comparison plus a closing count line.
pub fn render_group_results(results: &[ItemComparison]) -> String {
    let mut out: Vec<String> = results.iter().map(render_item_comparison).collect();
    let mismatched = results
        .iter()
        .filter(|r| r.status != mygis_types::ComparisonStatus::Ok)
        .count();
    out.push(format!(
        "Compared {} item pair(s); {mismatched} not ok",
        results.len()
    ));
    out.join("\n")
}

fn push_samples(out: &mut Vec<String>, side: &str, rows: &[RecordDiffRow]) {
    if rows.is_empty() {
        return;
    }
    out.push(format!(
        "   {side}-only: {} unique rows (showing up to {SAMPLE_ROWS})",
        rows.len()
    ));
    for row in rows.iter().take(SAMPLE_ROWS) {
        out.push(format!(
            "     count={}, attrs={}",
            row.count,
            Value::Object(row.attributes.clone())
        ));
    }
}

/// Summary line plus details for every entry that is not `ok`.
pub fn render_record_comparison(result: &RecordComparison) -> String {
    let mut out = vec![headline(
        result.title.as_deref(),
        result.status,
        result.message.as_deref(),
    )];
    for entry in result.entries().filter(|e| e.status != EntryStatus::Ok) {
        out.push(format!(
            " - {} '{}' -> {} ({} vs {})",
            entry.kind.singular(),
            entry.name,
            entry.status,
            opt(entry.host_count),
            opt(entry.guest_count),
        ));
        match entry.status {
            EntryStatus::Mismatch => {
                push_samples(&mut out, "host", &entry.host_only);
                push_samples(&mut out, "guest", &entry.guest_only);
            }
            EntryStatus::MissingOnGuest | EntryStatus::MissingOnHost => out.push(format!(
                "   counts: host={} guest={}",
                opt(entry.host_count),
                opt(entry.guest_count)
            )),
            EntryStatus::Error => {
                out.push(format!("   error: {}", entry.message.as_deref().unwrap_or("")));
            }
            EntryStatus::Skipped => {
                out.push(format!("   note: {}", entry.message.as_deref().unwrap_or("")));
            }
            EntryStatus::Ok | EntryStatus::ExtraOnGuest => {}
        }
    }
    out.join("\n")
}
