//! Source adapters.
//!
//! An adapter pages through one platform's listing and turns every entry
//! into a [`Post`](crate::media::Post). The gather session drives it.

pub mod url_list;

use async_trait::async_trait;

use crate::api::HttpClient;
use crate::error::Result;
use crate::media::PostRef;

pub use url_list::UrlListSource;

/// Whether a listing has more pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation<C> {
    Next(C),
    Done,
}

/// One page of a listing.
#[derive(Debug)]
pub struct Page<C> {
    pub posts: Vec<PostRef>,
    pub continuation: Continuation<C>,
}

impl<C> Page<C> {
    /// The last page.
    pub fn done(posts: Vec<PostRef>) -> Self {
        Self {
            posts,
            continuation: Continuation::Done,
        }
    }
}

/// A paged listing on some platform.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Opaque position in the listing.
    type Cursor: Send + 'static;

    /// Name used in log lines and errors.
    fn name(&self) -> &str;

    /// Whether posts arrive newest first. An age limit can only end
    /// gathering early when they do.
    fn is_time_sorted(&self) -> bool {
        true
    }

    /// Fetch the page at `cursor`, or the first page for `None`.
    async fn next_page(
        &self,
        client: &HttpClient,
        cursor: Option<Self::Cursor>,
    ) -> Result<Page<Self::Cursor>>;
}
