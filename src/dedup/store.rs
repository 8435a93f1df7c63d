//! Perceptual-hash store guarding the save directory.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use image_hasher::ImageHash;
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::config::DedupConfig;
use crate::dedup::hash::{hash_bytes, hash_file, hash_image, similarity};
use crate::error::Result;
use crate::fs::{file_created, list_image_files};

/// One image known to the store.
#[derive(Debug, Clone)]
pub struct ImageDetails {
    /// Where the image came from (URL for downloads, path for seeded files).
    pub uri: String,
    pub file: PathBuf,
    /// Low-resolution hash.
    pub hash: ImageHash,
    pub width: u32,
    pub height: u32,
    pub created: SystemTime,
    seq: u64,
}

impl ImageDetails {
    pub fn pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// A freshly downloaded image offered to [`DedupStore::try_store`].
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub uri: &'a str,
    pub file: &'a Path,
    pub width: u32,
    pub height: u32,
}

/// Result of [`DedupStore::try_store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    /// Stored under this key; the caller may persist the bytes.
    Accepted(String),
    /// Same low-resolution hash as an image already stored.
    Duplicate { existing: PathBuf },
}

/// Hash parameters.
#[derive(Debug, Clone, Copy)]
pub struct DedupOptions {
    pub hash_size: u32,
    pub verify_hash_size: u32,
}

impl Default for DedupOptions {
    fn default() -> Self {
        Self {
            hash_size: 16,
            verify_hash_size: 64,
        }
    }
}

impl From<&DedupConfig> for DedupOptions {
    fn from(config: &DedupConfig) -> Self {
        Self {
            hash_size: config.hash_size,
            verify_hash_size: config.verify_hash_size,
        }
    }
}

/// Outcome of seeding from disk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub hashed: usize,
    /// Files whose hash matched another file already on disk.
    pub collisions: usize,
    pub unreadable: usize,
}

/// Outcome of a duplicate sweep.
#[derive(Debug, Default, Clone)]
pub struct EliminationReport {
    pub deleted: Vec<PathBuf>,
    pub comparisons: usize,
    /// Pairs that matched on the cheap hash but not on the confirming one.
    pub rejected_matches: usize,
    pub delete_failures: usize,
}

#[derive(Debug, Default)]
struct StoreInner {
    entries: HashMap<String, ImageDetails>,
    /// Seeded files sharing a key with an entry; they only take part in sweeps.
    collisions: Vec<ImageDetails>,
    next_seq: u64,
}

impl StoreInner {
    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

/// Content-addressed store keyed by the low-resolution perceptual hash.
#[derive(Debug, Default)]
pub struct DedupStore {
    options: DedupOptions,
    inner: Mutex<StoreInner>,
}

impl DedupStore {
    pub fn new(options: DedupOptions) -> Self {
        Self {
            options,
            inner: Mutex::new(StoreInner::default()),
        }
    }

    pub fn options(&self) -> DedupOptions {
        self.options
    }

    /// Number of keyed entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hash every image already in `dir` so it is neither saved again nor
    /// left undetected as a duplicate.
    ///
    /// Files are hashed in parallel, `batch_size` files per work item: smaller
    /// batches spread the work wider at the cost of more CPU contention.
    pub fn seed_from_directory(&self, dir: &Path, batch_size: usize) -> Result<SeedReport> {
        let files = list_image_files(dir)?;
        tracing::info!("Hashing {} existing images in {}", files.len(), dir.display());

        let batch_size = batch_size.max(1);
        let reports: Vec<SeedReport> = files
            .par_chunks(batch_size)
            .map(|chunk| {
                let mut report = SeedReport::default();
                for path in chunk {
                    match self.describe_file(path) {
                        Ok(details) => {
                            report.hashed += 1;
                            if !self.insert_seeded(details) {
                                report.collisions += 1;
                            }
                        }
                        Err(e) => {
                            tracing::warn!("Could not hash {}: {}", path.display(), e);
                            report.unreadable += 1;
                        }
                    }
                }
                report
            })
            .collect();

        Ok(reports.into_iter().fold(SeedReport::default(), |acc, r| SeedReport {
            hashed: acc.hashed + r.hashed,
            collisions: acc.collisions + r.collisions,
            unreadable: acc.unreadable + r.unreadable,
        }))
    }

    fn describe_file(&self, path: &Path) -> Result<ImageDetails> {
        let image = image::open(path)?;
        Ok(ImageDetails {
            uri: path.display().to_string(),
            file: path.to_path_buf(),
            hash: hash_image(&image, self.options.hash_size),
            width: image.width(),
            height: image.height(),
            created: file_created(path)?,
            seq: 0,
        })
    }

    /// Insert a seeded file; returns `false` when its key was already taken.
    fn insert_seeded(&self, mut details: ImageDetails) -> bool {
        let key = details.hash.to_base64();
        let mut inner = self.inner.lock();
        details.seq = inner.next_seq();
        if inner.entries.contains_key(&key) {
            inner.collisions.push(details);
            false
        } else {
            inner.entries.insert(key, details);
            true
        }
    }

    /// Atomically check whether `bytes` is already known and, if not, claim it.
    ///
    /// Hashing happens outside the lock; the lookup and insert happen under
    /// one lock, so among concurrent callers with the same image exactly one
    /// is accepted.
    pub fn try_store(&self, bytes: &[u8], candidate: Candidate<'_>) -> Result<StoreOutcome> {
        let hash = hash_bytes(bytes, self.options.hash_size)?;
        let key = hash.to_base64();

        let mut inner = self.inner.lock();
        if let Some(existing) = inner.entries.get(&key) {
            return Ok(StoreOutcome::Duplicate {
                existing: existing.file.clone(),
            });
        }

        let seq = inner.next_seq();
        inner.entries.insert(
            key.clone(),
            ImageDetails {
                uri: candidate.uri.to_string(),
                file: candidate.file.to_path_buf(),
                hash,
                width: candidate.width,
                height: candidate.height,
                created: SystemTime::now(),
                seq,
            },
        );
        Ok(StoreOutcome::Accepted(key))
    }

    /// Forget an accepted entry whose bytes never made it to disk.
    pub fn release(&self, key: &str) {
        self.inner.lock().entries.remove(key);
    }

    /// Delete near-duplicates among everything stored, then clear the store.
    ///
    /// Entries are visited newest first. A pair whose cheap hashes reach
    /// `threshold` is re-hashed from disk at the confirming size; only when
    /// that still matches is one file deleted: the one with fewer pixels, or
    /// on a pixel tie the newer one.
    pub fn eliminate_duplicates(&self, threshold: f64) -> EliminationReport {
        let mut items: Vec<ImageDetails> = {
            let mut inner = self.inner.lock();
            let collisions = std::mem::take(&mut inner.collisions);
            std::mem::take(&mut inner.entries)
                .into_values()
                .chain(collisions)
                .collect()
        };
        items.sort_by(|a, b| b.seq.cmp(&a.seq));

        let mut report = EliminationReport::default();
        let mut removed = vec![false; items.len()];
        let mut verified: Vec<Option<Option<ImageHash>>> = vec![None; items.len()];

        for i in 0..items.len() {
            for j in (i + 1)..items.len() {
                if removed[i] {
                    break;
                }
                if removed[j] {
                    continue;
                }

                report.comparisons += 1;
                if similarity(&items[i].hash, &items[j].hash) < threshold {
                    continue;
                }

                let confirmed = match (
                    self.verify_hash(&items[i], &mut verified[i]),
                    self.verify_hash(&items[j], &mut verified[j]),
                ) {
                    (Some(a), Some(b)) => similarity(&a, &b) >= threshold,
                    _ => false,
                };
                if !confirmed {
                    tracing::debug!(
                        "{} and {} only look alike at low resolution",
                        items[i].file.display(),
                        items[j].file.display()
                    );
                    report.rejected_matches += 1;
                    continue;
                }

                let loser = if keep_first(&items[i], &items[j]) { j } else { i };
                let keeper = if loser == i { j } else { i };
                tracing::info!(
                    "Deleting {} (duplicate of {})",
                    items[loser].file.display(),
                    items[keeper].file.display()
                );
                match std::fs::remove_file(&items[loser].file) {
                    Ok(()) => report.deleted.push(items[loser].file.clone()),
                    Err(e) => {
                        tracing::warn!("Could not delete {}: {}", items[loser].file.display(), e);
                        report.delete_failures += 1;
                    }
                }
                removed[loser] = true;
            }
        }

        report
    }

    /// Confirming hash for `details`, computed at most once per sweep.
    fn verify_hash(
        &self,
        details: &ImageDetails,
        slot: &mut Option<Option<ImageHash>>,
    ) -> Option<ImageHash> {
        slot.get_or_insert_with(|| {
            hash_file(&details.file, self.options.verify_hash_size)
                .map_err(|e| {
                    tracing::warn!("Could not re-hash {}: {}", details.file.display(), e);
                })
                .ok()
        })
        .clone()
    }

    #[cfg(test)]
    pub(crate) fn insert_for_test(&self, key: &str, mut details: ImageDetails) {
        let mut inner = self.inner.lock();
        details.seq = inner.next_seq();
        inner.entries.insert(key.to_string(), details);
    }
}

/// Whether `a` survives over `b`: more pixels wins, then the older file.
fn keep_first(a: &ImageDetails, b: &ImageDetails) -> bool {
    match a.pixels().cmp(&b.pixels()) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => a.created <= b.created,
    }
}
