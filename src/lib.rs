//! Image Harvester - paged image crawling with perceptual deduplication
//!
//! This library gathers posts from paged listings, downloads their images and
//! keeps the save directory free of duplicate and near-duplicate images.
//!
//! # Features
//!
//! - Gathering with target counts, age cutoffs and validation rules
//! - Rate-limit aware HTTP client with an expiring API-key cache
//! - Concurrent download pipeline with strict response classification
//! - Perceptual-hash deduplication seeded from the save directory
//! - Ledger files for links that could not be saved as images
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use image_harvester::{
//!     CancelToken, Config, ContentLedger, DedupStore, Downloader, GatherSession, HttpClient,
//!     UrlListSource,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(Path::new("config.toml"))?;
//!     let cancel = CancelToken::new();
//!     let client = Arc::new(HttpClient::new(&config.network, cancel.clone())?);
//!
//!     let source = UrlListSource::from_file(Path::new("urls.txt"), 25)?;
//!     let posts = GatherSession::new(config.options.target_count, &cancel)
//!         .run(&source, &client)
//!         .await;
//!
//!     let store = Arc::new(DedupStore::new((&config.dedup).into()));
//!     let ledger = Arc::new(ContentLedger::new());
//!     let downloader = Downloader::new(client, &config, store, ledger, config.save_directory());
//!     let counts = downloader.download(&posts).await;
//!     println!("{} images saved", counts.downloaded);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod dedup;
pub mod download;
pub mod error;
pub mod fs;
pub mod gather;
pub mod ledger;
pub mod media;
pub mod output;
pub mod source;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenience
pub use api::HttpClient;
pub use cancel::CancelToken;
pub use config::Config;
pub use dedup::DedupStore;
pub use download::{DownloadCounts, Downloader};
pub use error::{Error, Result};
pub use gather::GatherSession;
pub use ledger::ContentLedger;
pub use media::{ImageResult, Post, PostRef};
pub use source::{SourceAdapter, UrlListSource};
