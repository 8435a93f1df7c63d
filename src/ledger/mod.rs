//! Content link ledger.
//!
//! Links that could not be saved as still images are collected during a run
//! and appended to one text file per reason in the save directory, so they
//! can be looked at (or fetched by other tools) later.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::Path;

use chrono::Local;
use parking_lot::Mutex;

use crate::error::Result;
use crate::media::ResolveReason;

/// Why a link ended up in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LinkReason {
    Animated,
    FailedDownload,
    NotFound,
    AlreadyDownloaded,
    Exception,
    Unknown,
}

impl LinkReason {
    /// Ledger file for this reason.
    pub fn file_name(self) -> &'static str {
        match self {
            LinkReason::Animated => "Animated Content.txt",
            LinkReason::FailedDownload => "Failed Downloads.txt",
            LinkReason::NotFound => "Not Found.txt",
            LinkReason::AlreadyDownloaded => "Already Downloaded.txt",
            LinkReason::Exception => "Exceptions.txt",
            LinkReason::Unknown => "Unknown.txt",
        }
    }

    /// Ledger reason for a failed resolve; `None` for success.
    pub fn from_resolve(reason: ResolveReason) -> Option<Self> {
        match reason {
            ResolveReason::Success => None,
            ResolveReason::Animated => Some(LinkReason::Animated),
            ResolveReason::NotFound => Some(LinkReason::NotFound),
            ResolveReason::Unknown => Some(LinkReason::Unknown),
            ResolveReason::AlreadyDownloaded => Some(LinkReason::AlreadyDownloaded),
            ResolveReason::Exception => Some(LinkReason::Exception),
        }
    }
}

impl fmt::Display for LinkReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkReason::Animated => write!(f, "Animated Content"),
            LinkReason::FailedDownload => write!(f, "Failed Downloads"),
            LinkReason::NotFound => write!(f, "Not Found"),
            LinkReason::AlreadyDownloaded => write!(f, "Already Downloaded"),
            LinkReason::Exception => write!(f, "Exceptions"),
            LinkReason::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A link that was not saved.
///
/// `number` is the score of the post it came from, so ledger files appended
/// over several runs still sort sensibly by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLink {
    pub url: String,
    pub number: i64,
    pub reason: LinkReason,
}

impl ContentLink {
    pub fn new(url: impl Into<String>, number: i64, reason: LinkReason) -> Self {
        Self {
            url: url.into(),
            number,
            reason,
        }
    }
}

/// In-memory collection of content links, safe to record into concurrently.
#[derive(Debug, Default)]
pub struct ContentLedger {
    links: Mutex<Vec<ContentLink>>,
}

impl ContentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, link: ContentLink) {
        tracing::debug!("Ledger [{}] #{} {}", link.reason, link.number, link.url);
        self.links.lock().push(link);
    }

    pub fn len(&self) -> usize {
        self.links.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append the recorded links to their ledger files under `dir`.
    ///
    /// Links whose URL is already in the file are left out; a file is only
    /// touched when at least one new line remains. Returns the number of
    /// lines written. Recorded links are drained either way.
    pub fn flush(&self, dir: &Path) -> Result<usize> {
        let links = std::mem::take(&mut *self.links.lock());

        let mut groups: BTreeMap<LinkReason, Vec<ContentLink>> = BTreeMap::new();
        for link in links {
            groups.entry(link.reason).or_default().push(link);
        }

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let mut written = 0;

        for (reason, group) in groups {
            let path = dir.join(reason.file_name());
            let existing = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
                Err(e) => return Err(e.into()),
            };

            let width = group
                .iter()
                .map(|link| link.number.unsigned_abs().to_string().len())
                .max()
                .unwrap_or(1);

            let mut lines = Vec::new();
            for link in &group {
                let already_listed = existing.contains(&link.url)
                    || lines.iter().any(|line: &String| line.ends_with(&link.url));
                if !already_listed {
                    lines.push(format!("{} {}", padded(link.number, width), link.url));
                }
            }

            if lines.is_empty() {
                continue;
            }

            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            writeln!(file, "{} - {}", reason, timestamp)?;
            for line in &lines {
                writeln!(file, "{}", line)?;
            }
            writeln!(file)?;

            tracing::info!("Wrote {} links to {}", lines.len(), path.display());
            written += lines.len();
        }

        Ok(written)
    }
}

/// Zero-pad the magnitude of `number` to `width` digits, keeping its sign.
fn padded(number: i64, width: usize) -> String {
    let sign = if number < 0 { "-" } else { "" };
    format!("{}{:0width$}", sign, number.unsigned_abs(), width = width)
}
