//! Configuration structures and loading logic.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration structure.
///
/// Built once at startup from the TOML file and CLI overrides, validated, and
/// then handed to every component by reference. Nothing mutates it afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub options: OptionsConfig,

    #[serde(default)]
    pub filters: FilterConfig,

    #[serde(default)]
    pub dedup: DedupConfig,

    #[serde(default)]
    pub network: NetworkConfig,
}

/// General run options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsConfig {
    /// Directory downloaded images and ledger files are written to.
    #[serde(default)]
    pub save_directory: Option<PathBuf>,

    /// Number of posts to gather before stopping.
    #[serde(default = "default_target_count")]
    pub target_count: usize,

    /// Create the save directory when it does not exist.
    #[serde(default)]
    pub create_directory: bool,

    /// Whether to show per-image download lines.
    #[serde(default = "default_true")]
    pub show_downloads: bool,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            save_directory: None,
            target_count: default_target_count(),
            create_directory: false,
            show_downloads: true,
        }
    }
}

/// Post and image filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub min_width: u32,

    #[serde(default)]
    pub min_height: u32,

    /// Posts older than this many days stop (time-sorted sources) or are ignored.
    #[serde(default)]
    pub max_age_days: Option<u32>,

    /// Smallest accepted width / height ratio.
    #[serde(default = "default_min_aspect")]
    pub min_aspect: f64,

    /// Largest accepted width / height ratio.
    #[serde(default = "default_max_aspect")]
    pub max_aspect: f64,

    #[serde(default)]
    pub min_score: Option<i64>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_width: 0,
            min_height: 0,
            max_age_days: None,
            min_aspect: default_min_aspect(),
            max_aspect: default_max_aspect(),
            min_score: None,
        }
    }
}

/// Perceptual-hash deduplication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Similarity (0..=1) at or above which two images count as duplicates.
    #[serde(default = "default_similarity")]
    pub similarity_threshold: f64,

    /// Files per parallel chunk when hashing the save directory.
    #[serde(default = "default_seed_batch")]
    pub seed_batch_size: usize,

    /// Edge length of the cheap hash used for keys and first-pass comparison.
    #[serde(default = "default_hash_size")]
    pub hash_size: u32,

    /// Edge length of the hash used to confirm a match before deleting.
    #[serde(default = "default_verify_hash_size")]
    pub verify_hash_size: u32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity(),
            seed_batch_size: default_seed_batch(),
            hash_size: default_hash_size(),
            verify_hash_size: default_verify_hash_size(),
        }
    }
}

/// HTTP and crawling behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Overall timeout for a single request.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Attempts made while the server keeps answering with rate-limit statuses.
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,

    /// First backoff wait; doubled on every further attempt.
    #[serde(default = "default_initial_wait")]
    pub initial_wait_ms: u64,

    /// Pause between consecutive page requests.
    #[serde(default = "default_request_delay")]
    pub request_delay_ms: u64,

    /// Images of one post downloaded at the same time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Consecutive pages without new posts tolerated before gathering ends.
    #[serde(default = "default_empty_page_retries")]
    pub empty_page_retries: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_tries: default_max_tries(),
            initial_wait_ms: default_initial_wait(),
            request_delay_ms: default_request_delay(),
            concurrency: default_concurrency(),
            empty_page_retries: default_empty_page_retries(),
            user_agent: default_user_agent(),
        }
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn initial_wait(&self) -> Duration {
        Duration::from_millis(self.initial_wait_ms)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

fn default_true() -> bool {
    true
}

fn default_target_count() -> usize {
    100
}

fn default_min_aspect() -> f64 {
    0.0
}

fn default_max_aspect() -> f64 {
    f64::MAX
}

fn default_similarity() -> f64 {
    0.9
}

fn default_seed_batch() -> usize {
    20
}

fn default_hash_size() -> u32 {
    16
}

fn default_verify_hash_size() -> u32 {
    64
}

fn default_timeout() -> u64 {
    30
}

fn default_max_tries() -> u32 {
    3
}

fn default_initial_wait() -> u64 {
    2000
}

fn default_request_delay() -> u64 {
    500
}

fn default_concurrency() -> usize {
    5
}

fn default_empty_page_retries() -> u32 {
    1
}

fn default_user_agent() -> String {
    format!("image-harvester/{}", env!("CARGO_PKG_VERSION"))
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Config(format!(
                    "Configuration file not found: {}",
                    path.display()
                ))
            } else {
                Error::Io(e)
            }
        })?;

        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Find the configuration file to use when none was given explicitly.
    ///
    /// Looks for `config.toml` in the working directory first, then in the
    /// platform configuration directory.
    pub fn default_path() -> Option<PathBuf> {
        let local = PathBuf::from("config.toml");
        if local.exists() {
            return Some(local);
        }

        directories::ProjectDirs::from("", "", "image-harvester")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .filter(|path| path.exists())
    }

    /// Get the effective save directory.
    pub fn save_directory(&self) -> PathBuf {
        self.options
            .save_directory
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    /// Oldest creation time a post may have, if an age limit is configured.
    pub fn cutoff(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.filters
            .max_age_days
            .map(|days| chrono::Utc::now() - chrono::Duration::days(i64::from(days)))
    }
}
