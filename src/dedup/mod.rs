//! Deduplication module.
//!
//! Provides:
//! - Perceptual image hashing
//! - A hash-keyed store that admits each image once
//! - The end-of-run near-duplicate sweep

pub mod hash;
pub mod store;

pub use hash::{hash_bytes, hash_file, image_dimensions, similarity};
pub use store::{
    Candidate, DedupOptions, DedupStore, EliminationReport, ImageDetails, SeedReport,
    StoreOutcome,
};
