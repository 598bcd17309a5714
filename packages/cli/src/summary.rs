//! Human-readable reports printed after each command.

use std::fmt::Write;
use std::time::Duration;

use console::style;
use stagehand_server::originals::OriginalImageStats;
use stagehand_server::reconcile::{ReconcileResult, StuckCleanupResult};

pub fn reconcile(result: &ReconcileResult) -> String {
    let mut out = String::new();

    let title = if result.dry_run {
        format!("{} Reconciliation report", style("DRY RUN").yellow().bold())
    } else {
        "Reconciliation report".to_string()
    };
    let _ = writeln!(out, "{title}");
    if result.cancelled {
        let _ = writeln!(out, "  {}", style("interrupted, results are partial").red());
    }

    let _ = writeln!(out, "  checked:           {}", result.checked);
    let _ = writeln!(out, "  missing original:  {}", result.missing_original);
    let _ = writeln!(out, "  missing staged:    {}", result.missing_staged);
    if result.dry_run {
        let _ = writeln!(out, "  would update:      {}", result.missing_staged);
    } else {
        let _ = writeln!(out, "  updated:           {}", result.updated);
    }
    let _ = writeln!(out, "  check failures:    {}", result.check_failures);

    if !result.examples.is_empty() {
        let _ = writeln!(out, "  examples:");
        for example in &result.examples {
            let _ = writeln!(
                out,
                "    #{} [{}] {}",
                example.id, example.status, example.description
            );
        }
    }

    out
}

pub fn stuck_cleanup(result: &StuckCleanupResult, older_than_hours: u64) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Deleted {} staged image(s) queued for more than {older_than_hours}h",
        result.deleted_ids.len()
    );
    if !result.deleted_ids.is_empty() {
        let ids: Vec<String> = result.deleted_ids.iter().map(i32::to_string).collect();
        let _ = writeln!(out, "  ids: {}", ids.join(", "));
    }
    out
}

pub fn orphan_cleanup(deleted: u64, grace: Duration) -> String {
    format!(
        "Deleted {deleted} orphaned original(s) idle for more than {}h\n",
        grace.as_secs() / 3600
    )
}

pub fn stats(stats: &OriginalImageStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Originals");
    let _ = writeln!(
        out,
        "  total:            {} ({})",
        stats.total_count,
        human_bytes(stats.total_size)
    );
    let _ = writeln!(
        out,
        "  orphaned:         {} ({})",
        stats.orphaned_count,
        human_bytes(stats.orphaned_size)
    );
    let _ = writeln!(out, "  avg references:   {:.2}", stats.avg_references);
    out
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
