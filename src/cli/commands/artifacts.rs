//! Artifacts command - inspect and prune the artifact cache

use crate::cache::{create_artifact_cache, format_bytes, CacheEntry, LocalArtifactCache};
use crate::cli::args::{ArtifactsAction, ArtifactsArgs, OutputFormat};
use crate::config::Config;
use crate::error::MorphResult;
use crate::ui::{self, UiContext};
use chrono::{Duration, Utc};
use console::style;
use std::io::{self, Write};
use tracing::debug;

/// Execute the artifacts command
pub async fn execute(args: ArtifactsArgs, config: &Config) -> MorphResult<()> {
    let cache = create_artifact_cache(config);
    let ctx = UiContext::detect();

    match args.action {
        ArtifactsAction::List { format } => list_entries(&cache, format),
        ArtifactsAction::Gc { days, dry_run } => gc_entries(&ctx, &cache, config, days, dry_run),
        ArtifactsAction::Clear { yes } => clear_entries(&ctx.with_auto_yes(yes), &cache),
    }
}

/// List everything in the artifact cache
fn list_entries(cache: &LocalArtifactCache, format: OutputFormat) -> MorphResult<()> {
    let entries = cache.entries()?;

    if entries.is_empty() && format != OutputFormat::Json {
        println!("No cached artifacts found.");
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_entry_table(&entries),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Plain => {
            for entry in &entries {
                println!("{}", entry.path.display());
            }
        }
    }

    Ok(())
}

fn print_entry_table(entries: &[CacheEntry]) {
    println!("{:<80} {:<10} {:>10} {:<20}", "FILE", "KIND", "SIZE", "MODIFIED");
    println!("{}", "-".repeat(123));

    for entry in entries {
        let name = entry
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!(
            "{:<80} {:<10} {:>10} {:<20}",
            name,
            entry.kind,
            format_bytes(entry.size),
            entry.modified.format("%Y-%m-%d %H:%M")
        );
    }

    let total: u64 = entries.iter().map(|e| e.size).sum();
    println!();
    println!("Total: {} file(s), {}", entries.len(), format_bytes(total));
}

/// Remove entries older than the configured age
fn gc_entries(
    ctx: &UiContext,
    cache: &LocalArtifactCache,
    config: &Config,
    days_override: Option<u32>,
    dry_run: bool,
) -> MorphResult<()> {
    let gc_days = days_override.unwrap_or(config.cache.gc_days);

    if gc_days == 0 {
        println!("Artifact GC is disabled (gc_days = 0)");
        return Ok(());
    }

    let cutoff = Utc::now() - Duration::days(i64::from(gc_days));

    if dry_run {
        let stale: Vec<CacheEntry> = cache
            .entries()?
            .into_iter()
            .filter(|e| e.modified < cutoff)
            .collect();
        if stale.is_empty() {
            println!("No artifacts older than {} days.", gc_days);
            return Ok(());
        }
        println!("Found {} file(s) older than {} days:", stale.len(), gc_days);
        for entry in &stale {
            print_age(entry);
        }
        println!();
        println!("Dry run - nothing removed.");
        return Ok(());
    }

    let removed = cache.remove_older_than(cutoff)?;
    if removed.is_empty() {
        println!("No artifacts older than {} days.", gc_days);
        return Ok(());
    }

    for entry in &removed {
        debug!("Removed {}", entry.path.display());
        print_age(entry);
    }
    let freed: u64 = removed.iter().map(|e| e.size).sum();
    ui::step_ok(
        ctx,
        &format!(
            "Removed {} file(s), freed {}",
            removed.len(),
            format_bytes(freed)
        ),
    );

    Ok(())
}

fn print_age(entry: &CacheEntry) {
    let age_days = (Utc::now() - entry.modified).num_days();
    println!(
        "  {} {} ({} days old)",
        style("•").red(),
        entry.path.display(),
        age_days
    );
}

/// Remove everything
fn clear_entries(ctx: &UiContext, cache: &LocalArtifactCache) -> MorphResult<()> {
    let entries = cache.entries()?;

    if entries.is_empty() {
        println!("No cached artifacts to clear.");
        return Ok(());
    }

    let total: u64 = entries.iter().map(|e| e.size).sum();
    println!(
        "This will remove {} file(s) ({}) from {}",
        entries.len(),
        format_bytes(total),
        cache.root().display()
    );
    println!();

    if !ctx.auto_yes() {
        if !ctx.can_prompt() {
            ui::step_warn_hint(ctx, "Not clearing without confirmation", "Pass --yes");
            return Ok(());
        }

        print!("Are you sure? [y/N] ");
        let _ = io::stdout().flush();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            println!("Failed to read input, aborting.");
            return Ok(());
        }

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let removed = cache.clear()?;
    ui::step_ok(ctx, &format!("Cleared {} file(s)", removed));

    Ok(())
}
