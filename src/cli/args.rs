//! Command-line argument definitions using clap.

use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

/// Image harvester CLI.
#[derive(Parser, Debug)]
#[command(
    name = "image-harvester",
    version,
    about = "Download images from paged listings into a duplicate-free folder",
    long_about = "Pages through a listing of image posts, keeps the best-scored ones that pass the \
                  age, score and size filters, downloads them and removes perceptual duplicates \
                  from the save directory.\n\n\
                  SOURCE is a text file with one image URL per line, optionally prefixed by a \
                  score and a tab."
)]
pub struct Args {
    /// File listing the image URLs to harvest.
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Directory images are saved to.
    #[arg(short = 'd', long = "directory", env = "IMAGE_HARVESTER_DIR")]
    pub directory: Option<PathBuf>,

    /// Number of posts to gather.
    #[arg(short = 'n', long = "count")]
    pub count: Option<usize>,

    /// Minimum image width in pixels.
    #[arg(long)]
    pub min_width: Option<u32>,

    /// Minimum image height in pixels.
    #[arg(long)]
    pub min_height: Option<u32>,

    /// Ignore posts older than this many days.
    #[arg(long)]
    pub max_age_days: Option<u32>,

    /// Smallest accepted width / height ratio.
    #[arg(long)]
    pub min_aspect: Option<f64>,

    /// Largest accepted width / height ratio.
    #[arg(long)]
    pub max_aspect: Option<f64>,

    /// Similarity (0-1] at which two images count as duplicates.
    #[arg(long)]
    pub similarity: Option<f64>,

    /// Files per parallel hashing batch when scanning the save directory.
    #[arg(long)]
    pub seed_batch: Option<usize>,

    /// Ignore posts scored below this.
    #[arg(long, allow_negative_numbers = true)]
    pub min_score: Option<i64>,

    /// Create the save directory if it does not exist.
    #[arg(long)]
    pub create_dir: bool,

    /// Path to configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum parallel downloads per post.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Hide per-image download lines and progress bars.
    #[arg(long, short)]
    pub quiet: bool,

    /// Enable debug logging.
    #[arg(long)]
    pub debug: bool,
}

impl Args {
    /// Merge CLI arguments into an existing config, overriding where specified.
    pub fn merge_into_config(&self, config: &mut Config) {
        if let Some(dir) = &self.directory {
            config.options.save_directory = Some(dir.clone());
        }

        if let Some(count) = self.count {
            config.options.target_count = count;
        }

        if self.create_dir {
            config.options.create_directory = true;
        }

        if self.quiet {
            config.options.show_downloads = false;
        }

        // Filters
        if let Some(width) = self.min_width {
            config.filters.min_width = width;
        }

        if let Some(height) = self.min_height {
            config.filters.min_height = height;
        }

        if let Some(days) = self.max_age_days {
            config.filters.max_age_days = Some(days);
        }

        if let Some(aspect) = self.min_aspect {
            config.filters.min_aspect = aspect;
        }

        if let Some(aspect) = self.max_aspect {
            config.filters.max_aspect = aspect;
        }

        if let Some(score) = self.min_score {
            config.filters.min_score = Some(score);
        }

        // Dedup
        if let Some(similarity) = self.similarity {
            config.dedup.similarity_threshold = similarity;
        }

        if let Some(batch) = self.seed_batch {
            config.dedup.seed_batch_size = batch;
        }

        if let Some(concurrency) = self.concurrency {
            config.network.concurrency = concurrency;
        }
    }
}
