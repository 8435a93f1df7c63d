//! Filesystem module.
//!
//! Provides:
//! - Destination filename generation and sanitizing
//! - Atomic (temp file + rename) writes
//! - Image file listing

pub mod naming;
pub mod paths;

pub use naming::{destination_path, sanitize_component, MAX_NAME_BYTES, MAX_PATH_CHARS};
pub use paths::{file_created, list_image_files, persist_atomically};
