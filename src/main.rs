//! Image Harvester - CLI entry point.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use image_harvester::{
    api::HttpClient,
    cancel::CancelToken,
    cli::Args,
    config::{ensure_save_directory, validate_config, Config},
    dedup::DedupStore,
    download::Downloader,
    error::{exit_codes, Error, Result},
    gather::{rules_from_filters, GatherSession},
    ledger::ContentLedger,
    output::{
        create_item_bar, create_spinner, print_banner, print_config_summary, print_error,
        print_info, print_run_stats, print_success, print_warning, RunStats,
    },
    source::{url_list::DEFAULT_PAGE_SIZE, UrlListSource},
};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(e) => {
            print_error(&format!("{}", e));
            match e {
                Error::Cancelled => ExitCode::from(exit_codes::ABORT as u8),
                Error::Config(_) | Error::ConfigValidation { .. } | Error::MissingConfig(_) => {
                    ExitCode::from(exit_codes::CONFIG_ERROR as u8)
                }
                Error::Download(_)
                | Error::Io(_)
                | Error::Http(_)
                | Error::RateLimited { .. }
                | Error::Image(_) => ExitCode::from(exit_codes::DOWNLOAD_ERROR as u8),
                _ => ExitCode::from(exit_codes::UNEXPECTED_ERROR as u8),
            }
        }
    }
}

async fn run() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    fmt().with_env_filter(filter).with_target(false).init();

    if !args.quiet {
        print_banner();
    }

    // Load configuration
    let mut config = match args.config.clone().or_else(Config::default_path) {
        Some(path) => {
            tracing::debug!("Loading configuration from {}", path.display());
            Config::load(&path)?
        }
        None => {
            print_info("No configuration file found, using defaults with CLI arguments");
            Config::default()
        }
    };

    // Merge CLI arguments into config
    args.merge_into_config(&mut config);

    // Validate configuration
    validate_config(&config)?;

    let save_dir = config.save_directory();
    ensure_save_directory(&save_dir, config.options.create_directory)?;

    if !args.quiet {
        print_config_summary(&config, &args.source, &save_dir);
    }

    let source = UrlListSource::from_file(&args.source, DEFAULT_PAGE_SIZE)?;
    if source.is_empty() {
        print_warning(&format!("No usable URLs in {}", args.source.display()));
    }

    // Ctrl-C stops gathering and downloading; results so far are still kept
    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                print_warning("Interrupted, finishing the current batch...");
                cancel.cancel();
            }
        });
    }

    let client = Arc::new(HttpClient::new(&config.network, cancel.clone())?);
    let store = Arc::new(DedupStore::new((&config.dedup).into()));
    let ledger = Arc::new(ContentLedger::new());
    let mut stats = RunStats::default();

    // Hash what is already in the save directory
    let spinner = (!args.quiet).then(|| create_spinner("Hashing existing images..."));
    let seed_store = Arc::clone(&store);
    let seed_dir = save_dir.clone();
    let batch_size = config.dedup.seed_batch_size;
    stats.seeded = tokio::task::spawn_blocking(move || {
        seed_store.seed_from_directory(&seed_dir, batch_size)
    })
    .await
    .map_err(|e| Error::Download(format!("Hashing task failed: {}", e)))??;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    if stats.seeded.collisions > 0 {
        print_info(&format!(
            "{} existing images share a hash with another file",
            stats.seeded.collisions
        ));
    }

    // Gather posts
    let mut session = GatherSession::new(config.options.target_count, &cancel)
        .with_rules(rules_from_filters(&config.filters))
        .with_empty_page_retries(config.network.empty_page_retries);
    if let Some(cutoff) = config.cutoff() {
        session = session.with_cutoff(cutoff);
    }
    let posts = session.run(&source, &client).await;
    stats.gathered = posts.len();

    // Download
    let mut downloader = Downloader::new(
        Arc::clone(&client),
        &config,
        Arc::clone(&store),
        Arc::clone(&ledger),
        save_dir.clone(),
    );
    if !args.quiet {
        downloader = downloader.with_progress(create_item_bar(posts.len() as u64, "Posts"));
    }
    stats.downloads = downloader.download(&posts).await;

    // Remove near-duplicates
    if !cancel.is_cancelled() {
        let sweep_store = Arc::clone(&store);
        let threshold = config.dedup.similarity_threshold;
        stats.sweep =
            tokio::task::spawn_blocking(move || sweep_store.eliminate_duplicates(threshold))
                .await
                .map_err(|e| Error::Download(format!("Duplicate sweep failed: {}", e)))?;
    }

    // Ledger is written even after an interrupt
    stats.ledgered = ledger.flush(&save_dir)?;

    print_run_stats(&stats);

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    print_success("Done");
    Ok(())
}
