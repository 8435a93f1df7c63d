//! Configuration module for the image-harvester.
//!
//! This module handles:
//! - Loading configuration from TOML files
//! - CLI argument merging (see `cli`)
//! - Configuration validation

pub mod loader;
pub mod validation;

pub use loader::{Config, DedupConfig, FilterConfig, NetworkConfig, OptionsConfig};
pub use validation::{ensure_save_directory, validate_config};
