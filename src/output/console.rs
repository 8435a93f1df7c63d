//! Console output utilities.

use std::path::Path;

use console::style;

use crate::config::Config;

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", style("INFO").cyan().bold(), message);
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", style("OK").green().bold(), message);
}

/// Print a warning message.
pub fn print_warning(message: &str) {
    println!("{} {}", style("WARN").yellow().bold(), message);
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", style("ERROR").red().bold(), message);
}

/// Print the application banner.
pub fn print_banner() {
    let banner = format!(
        r#"
╔═══════════════════════════════════════════════════════╗
║     image-harvester {:<34}║
║     paged image crawling with perceptual dedup        ║
╚═══════════════════════════════════════════════════════╝
"#,
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style(banner).cyan());
}

/// Print configuration summary.
pub fn print_config_summary(config: &Config, source: &Path, save_dir: &Path) {
    let filters = &config.filters;

    println!();
    println!("{}", style("Configuration:").bold());
    println!("  Source: {}", source.display());
    println!("  Directory: {}", save_dir.display());
    println!("  Target: {} posts", config.options.target_count);
    if filters.min_width > 0 || filters.min_height > 0 {
        println!("  Minimum size: {}x{}", filters.min_width, filters.min_height);
    }
    if let Some(days) = filters.max_age_days {
        println!("  Maximum age: {} days", days);
    }
    if let Some(score) = filters.min_score {
        println!("  Minimum score: {}", score);
    }
    println!("  Similarity: {}", config.dedup.similarity_threshold);
    println!();
}
