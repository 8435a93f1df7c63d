//! Source backed by a local file of image URLs.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

use crate::api::HttpClient;
use crate::error::{Error, Result};
use crate::media::{ImageLink, ImageResult, Post, PostRef};
use crate::source::{Continuation, Page, SourceAdapter};

/// Posts per page when none is given.
pub const DEFAULT_PAGE_SIZE: usize = 25;

/// A post that is a single direct image URL.
#[derive(Debug, Clone)]
pub struct UrlPost {
    id: String,
    url: String,
    score: i64,
    created_at: DateTime<Utc>,
}

#[async_trait]
impl Post for UrlPost {
    fn id(&self) -> &str {
        &self.id
    }

    fn post_url(&self) -> &str {
        &self.url
    }

    fn score(&self) -> i64 {
        self.score
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    async fn resolve(&self, _client: &HttpClient) -> ImageResult {
        ImageResult::success(vec![ImageLink::new(self.url.clone())])
    }
}

/// Pages through a text file with one image URL per line.
///
/// Lines may carry a score as `score<TAB>url`. Blank lines and lines starting
/// with `#` are skipped, as are lines without a valid http(s) URL. A post's id
/// is its line number, so it stays stable while the file is only appended to.
#[derive(Debug)]
pub struct UrlListSource {
    name: String,
    posts: Vec<PostRef>,
    page_size: usize,
}

impl UrlListSource {
    /// Read the list at `path`. Every post gets the file's modification time.
    pub fn from_file(path: &Path, page_size: usize) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Config(format!("URL list not found: {}", path.display()))
            } else {
                Error::Io(e)
            }
        })?;
        let modified: DateTime<Utc> = std::fs::metadata(path)?.modified()?.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "url-list".to_string());

        Ok(Self::parse(&name, &content, modified, page_size))
    }

    /// Build a source from list text.
    pub fn parse(name: &str, content: &str, created_at: DateTime<Utc>, page_size: usize) -> Self {
        let mut posts: Vec<PostRef> = Vec::new();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (score, url) = match line.split_once('\t') {
                Some((score, url)) => match score.trim().parse::<i64>() {
                    Ok(score) => (score, url.trim()),
                    Err(_) => {
                        tracing::warn!("{}:{}: invalid score '{}'", name, index + 1, score);
                        continue;
                    }
                },
                None => (0, line),
            };

            match Url::parse(url) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
                    posts.push(Arc::new(UrlPost {
                        id: (index + 1).to_string(),
                        url: parsed.to_string(),
                        score,
                        created_at,
                    }));
                }
                _ => tracing::warn!("{}:{}: not an http(s) URL: {}", name, index + 1, url),
            }
        }

        tracing::debug!("{} holds {} URLs", name, posts.len());

        Self {
            name: name.to_string(),
            posts,
            page_size: page_size.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

#[async_trait]
impl SourceAdapter for UrlListSource {
    type Cursor = usize;

    fn name(&self) -> &str {
        &self.name
    }

    fn is_time_sorted(&self) -> bool {
        false
    }

    async fn next_page(&self, _client: &HttpClient, cursor: Option<usize>) -> Result<Page<usize>> {
        let start = cursor.unwrap_or(0).min(self.posts.len());
        let end = (start + self.page_size).min(self.posts.len());

        let continuation = if end < self.posts.len() {
            Continuation::Next(end)
        } else {
            Continuation::Done
        };

        Ok(Page {
            posts: self.posts[start..end].to_vec(),
            continuation,
        })
    }
}
