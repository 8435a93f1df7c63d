//! Download outcomes and run counters.

use std::ops::AddAssign;
use std::path::PathBuf;

use crate::media::ResolveReason;

/// What happened to one image URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    /// Bytes written to this path.
    Saved(PathBuf),
    /// The destination file was already there; nothing was fetched.
    AlreadyDownloaded,
    /// Video or gif content.
    Animated,
    /// The server did not send an image.
    NotImage,
    /// Below the minimum size or outside the aspect range.
    TooSmall,
    /// Perceptually identical to an image already stored.
    Duplicate,
    /// Request, status or decode failure.
    Failed,
    /// Fetched and accepted, but writing the file failed.
    PersistFailed,
}

/// Per-run download statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DownloadCounts {
    pub downloaded: u64,
    pub duplicates: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl DownloadCounts {
    /// Count one URL outcome.
    pub fn record(&mut self, outcome: &ImageOutcome) {
        match outcome {
            ImageOutcome::Saved(_) => self.downloaded += 1,
            ImageOutcome::Duplicate => self.duplicates += 1,
            ImageOutcome::Failed | ImageOutcome::PersistFailed => self.failed += 1,
            ImageOutcome::AlreadyDownloaded
            | ImageOutcome::Animated
            | ImageOutcome::NotImage
            | ImageOutcome::TooSmall => self.skipped += 1,
        }
    }

    /// Count a post that did not resolve to any image.
    pub fn record_unresolved(&mut self, reason: ResolveReason) {
        match reason {
            ResolveReason::Animated | ResolveReason::AlreadyDownloaded => self.skipped += 1,
            ResolveReason::Success
            | ResolveReason::NotFound
            | ResolveReason::Unknown
            | ResolveReason::Exception => self.failed += 1,
        }
    }

    /// Total URLs and posts accounted for.
    pub fn total(&self) -> u64 {
        self.downloaded + self.duplicates + self.failed + self.skipped
    }
}

impl AddAssign for DownloadCounts {
    fn add_assign(&mut self, other: Self) {
        self.downloaded += other.downloaded;
        self.duplicates += other.duplicates;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}
