//! Statistics reporting.

use console::style;

use crate::dedup::{EliminationReport, SeedReport};
use crate::download::DownloadCounts;

/// Everything worth reporting about one run.
#[derive(Debug, Default)]
pub struct RunStats {
    pub seeded: SeedReport,
    pub gathered: usize,
    pub downloads: DownloadCounts,
    pub sweep: EliminationReport,
    pub ledgered: usize,
}

/// Print statistics for a finished (or aborted) run.
pub fn print_run_stats(stats: &RunStats) {
    println!();
    println!("{}", style("═".repeat(50)).dim());
    println!("{}", style("Run Statistics:").bold());
    println!("  Existing images: {}", stats.seeded.hashed);
    println!("  Posts gathered:  {}", stats.gathered);
    println!("  Downloaded: {}", style(stats.downloads.downloaded).green());
    println!("  Duplicates: {}", style(stats.downloads.duplicates).yellow());
    println!("  Skipped:    {}", stats.downloads.skipped);
    if stats.downloads.failed > 0 {
        println!("  Failed:     {}", style(stats.downloads.failed).red());
    }
    println!(
        "  Removed {} near-duplicates ({} comparisons)",
        stats.sweep.deleted.len(),
        stats.sweep.comparisons
    );
    if stats.ledgered > 0 {
        println!("  Ledgered links: {}", stats.ledgered);
    }
    println!("{}", style("═".repeat(50)).dim());
}

