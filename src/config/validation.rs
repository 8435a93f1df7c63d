//! Configuration validation logic.

use std::path::Path;

use crate::config::loader::Config;
use crate::error::{Error, Result};

/// Largest perceptual hash edge length accepted.
const MAX_HASH_SIZE: u32 = 256;

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_target_count(config.options.target_count)?;
    validate_aspect_range(config.filters.min_aspect, config.filters.max_aspect)?;
    validate_similarity(config.dedup.similarity_threshold)?;
    validate_positive("seed_batch_size", config.dedup.seed_batch_size)?;
    validate_positive("concurrency", config.network.concurrency)?;
    validate_positive("max_tries", config.network.max_tries as usize)?;
    validate_hash_sizes(config.dedup.hash_size, config.dedup.verify_hash_size)?;

    if config.network.timeout_secs == 0 {
        return Err(Error::ConfigValidation {
            field: "timeout_secs".to_string(),
            message: "Request timeout must be at least one second".to_string(),
        });
    }

    Ok(())
}

/// Validate the requested number of posts.
pub fn validate_target_count(count: usize) -> Result<()> {
    if count == 0 {
        return Err(Error::ConfigValidation {
            field: "target_count".to_string(),
            message: "At least one post must be requested".to_string(),
        });
    }
    Ok(())
}

/// Validate the accepted width / height ratio range.
pub fn validate_aspect_range(min: f64, max: f64) -> Result<()> {
    if min.is_nan() || max.is_nan() || min < 0.0 {
        return Err(Error::ConfigValidation {
            field: "min_aspect".to_string(),
            message: format!("Aspect ratio bounds must be non-negative numbers (got {min})"),
        });
    }

    if min > max {
        return Err(Error::ConfigValidation {
            field: "max_aspect".to_string(),
            message: format!("Maximum aspect ratio {max} is below the minimum {min}"),
        });
    }

    Ok(())
}

/// Validate the duplicate similarity threshold.
pub fn validate_similarity(threshold: f64) -> Result<()> {
    if !(threshold > 0.0 && threshold <= 1.0) {
        return Err(Error::ConfigValidation {
            field: "similarity_threshold".to_string(),
            message: format!("Similarity must be in (0, 1] (got {threshold})"),
        });
    }
    Ok(())
}

fn validate_positive(field: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(Error::ConfigValidation {
            field: field.to_string(),
            message: "Value must be greater than zero".to_string(),
        });
    }
    Ok(())
}

fn validate_hash_sizes(hash_size: u32, verify_hash_size: u32) -> Result<()> {
    for (field, size) in [("hash_size", hash_size), ("verify_hash_size", verify_hash_size)] {
        if !(2..=MAX_HASH_SIZE).contains(&size) {
            return Err(Error::ConfigValidation {
                field: field.to_string(),
                message: format!("Hash size must be between 2 and {MAX_HASH_SIZE} (got {size})"),
            });
        }
    }

    if verify_hash_size < hash_size {
        return Err(Error::ConfigValidation {
            field: "verify_hash_size".to_string(),
            message: "The confirming hash must not be smaller than the first-pass hash"
                .to_string(),
        });
    }

    Ok(())
}

/// Make sure the save directory exists, creating it when allowed.
pub fn ensure_save_directory(dir: &Path, create: bool) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Err(Error::MissingConfig("save_directory".to_string()));
    }

    if dir.is_dir() {
        return Ok(());
    }

    if dir.exists() {
        return Err(Error::Config(format!(
            "Save path is not a directory: {}",
            dir.display()
        )));
    }

    if !create {
        return Err(Error::Config(format!(
            "Save directory does not exist: {} (pass --create-dir to create it)",
            dir.display()
        )));
    }

    std::fs::create_dir_all(dir)?;
    tracing::info!("Created save directory {}", dir.display());
    Ok(())
}
