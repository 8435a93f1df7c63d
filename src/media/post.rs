//! Platform-agnostic post representation.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::api::HttpClient;

/// One crawled item from a source platform.
///
/// Adapters build posts once and never change them. The gather session and
/// the download pipeline only see this narrow interface.
#[async_trait]
pub trait Post: Send + Sync + fmt::Debug {
    /// Stable identifier, unique within the source.
    fn id(&self) -> &str;

    /// Link to the post on its platform.
    fn post_url(&self) -> &str;

    /// Ranking signal; its meaning depends on the platform.
    fn score(&self) -> i64;

    fn created_at(&self) -> DateTime<Utc>;

    /// Image size when the listing already reports it.
    fn dimensions(&self) -> Option<(u32, u32)> {
        None
    }

    /// Turn this post into concrete image URLs.
    async fn resolve(&self, client: &HttpClient) -> ImageResult;
}

/// Shared handle to a post.
pub type PostRef = Arc<dyn Post>;

/// Why resolving a post did or did not produce images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolveReason {
    Success,
    Animated,
    NotFound,
    Unknown,
    AlreadyDownloaded,
    Exception,
}

impl fmt::Display for ResolveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveReason::Success => write!(f, "success"),
            ResolveReason::Animated => write!(f, "animated"),
            ResolveReason::NotFound => write!(f, "not found"),
            ResolveReason::Unknown => write!(f, "unknown"),
            ResolveReason::AlreadyDownloaded => write!(f, "already downloaded"),
            ResolveReason::Exception => write!(f, "exception"),
        }
    }
}

/// A concrete image location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLink {
    pub url: String,

    /// Width and height when known without downloading.
    pub dimensions: Option<(u32, u32)>,
}

impl ImageLink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            dimensions: None,
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions = Some((width, height));
        self
    }
}

/// Result of resolving one post.
#[derive(Debug, Clone)]
pub struct ImageResult {
    pub reason: ResolveReason,
    pub links: Vec<ImageLink>,

    /// Free-form detail from the resolver (error message, page title, ...).
    pub text: Option<String>,
}

impl ImageResult {
    pub fn success(links: Vec<ImageLink>) -> Self {
        Self {
            reason: ResolveReason::Success,
            links,
            text: None,
        }
    }

    pub fn failure(reason: ResolveReason, text: impl Into<String>) -> Self {
        Self {
            reason,
            links: Vec::new(),
            text: Some(text.into()),
        }
    }

    /// Whether there is anything to download.
    pub fn is_ok(&self) -> bool {
        self.reason == ResolveReason::Success && !self.links.is_empty()
    }
}
