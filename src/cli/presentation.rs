//! CLI presentation: text and json formatters per command.

use crate::blacklist::Blacklist;
use crate::cleanup::CleanupReport;
use crate::error::RefreshError;
use crate::refresh::RefreshOutcome;
use crate::stub::StubEntry;
use crate::types::Millis;
use crate::version::to_version_string;
use comfy_table::Table;
use serde::Serialize;
use std::path::Path;

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, RefreshError> {
    serde_json::to_string_pretty(value).map_err(|e| RefreshError::Output(e.to_string()))
}

fn format_millis(millis: Millis) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}

pub fn format_refresh_text(outcome: &RefreshOutcome, cache_dir: &Path) -> String {
    let mut lines = vec![format!(
        "Refreshed {} (generator {})",
        cache_dir.display(),
        to_version_string(outcome.generator_version)
    )];
    if outcome.migrated {
        lines.push("Cache was missing or in legacy format".to_string());
    }
    if outcome.bootstrapped {
        lines.push("Unpacked pregenerated stubs".to_string());
    }
    if outcome.copied_from_base > 0 {
        lines.push(format!("Copied from base environment: {}", outcome.copied_from_base));
    }
    if outcome.builtins_updated {
        lines.push("Built-in stubs regenerated".to_string());
    }
    lines.push(format!("Generated: {}", outcome.generated));
    if outcome.copied_from_bundle > 0 {
        lines.push(format!("Copied from bundle: {}", outcome.copied_from_bundle));
    }
    if let Some(cleanup) = &outcome.cleanup {
        lines.push(format_cleanup_text(cleanup));
    }

    let failed = outcome.failed_modules();
    if failed.is_empty() {
        lines.push("No failing modules".to_string());
    } else {
        let fresh = outcome.notifiable_failures();
        lines.push(format!("Failing modules ({}):", failed.len()));
        for name in failed {
            let marker = if fresh.contains(&name) { " (new)" } else { "" };
            lines.push(format!("  {}{}", name, marker));
        }
    }
    lines.join("\n")
}

pub fn format_refresh_json(outcome: &RefreshOutcome) -> Result<String, RefreshError> {
    to_json(&serde_json::json!({
        "generator_version": to_version_string(outcome.generator_version),
        "migrated": outcome.migrated,
        "bootstrapped": outcome.bootstrapped,
        "copied_from_base": outcome.copied_from_base,
        "builtins_updated": outcome.builtins_updated,
        "generated": outcome.generated,
        "copied_from_bundle": outcome.copied_from_bundle,
        "cleanup": outcome.cleanup,
        "failed_modules": outcome.failed_modules(),
        "notifiable_failures": outcome.notifiable_failures(),
    }))
}

pub fn format_inventory_text(entries: &[StubEntry]) -> String {
    if entries.is_empty() {
        return "No stubs".to_string();
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Stub", "Format", "Origin", "Generator"]);
    for entry in entries {
        table.add_row(vec![
            entry.path.display().to_string(),
            entry.format.unwrap_or("-").to_string(),
            entry.origin.clone().unwrap_or_else(|| "-".to_string()),
            entry.generator_version.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table.to_string()
}

pub fn format_inventory_json(entries: &[StubEntry]) -> Result<String, RefreshError> {
    to_json(entries)
}

pub fn format_blacklist_text(blacklist: &Blacklist) -> String {
    if blacklist.is_empty() {
        return "Blacklist is empty".to_string();
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Binary", "Failed Generator", "Binary Modified"]);
    for (origin, entry) in blacklist.iter() {
        table.add_row(vec![
            origin.clone(),
            to_version_string(entry.failed_generator_version),
            format_millis(entry.binary_modified_at_millis),
        ]);
    }
    table.to_string()
}

pub fn format_blacklist_json(blacklist: &Blacklist) -> Result<String, RefreshError> {
    let rows: Vec<serde_json::Value> = blacklist
        .iter()
        .map(|(origin, entry)| {
            serde_json::json!({
                "origin": origin,
                "failed_generator_version": to_version_string(entry.failed_generator_version),
                "binary_modified_at_millis": entry.binary_modified_at_millis,
            })
        })
        .collect();
    to_json(&rows)
}

pub fn format_cleanup_text(report: &CleanupReport) -> String {
    format!(
        "Removed {} orphaned files and {} empty directories",
        report.removed_files, report.removed_dirs
    )
}
