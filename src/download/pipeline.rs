//! Image downloading.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;
use indicatif::ProgressBar;

use crate::api::HttpClient;
use crate::cancel::CancelToken;
use crate::config::{Config, FilterConfig};
use crate::dedup::{image_dimensions, Candidate, DedupStore, StoreOutcome};
use crate::download::state::{DownloadCounts, ImageOutcome};
use crate::fs::{destination_path, persist_atomically};
use crate::gather::aspect_within;
use crate::ledger::{ContentLedger, ContentLink, LinkReason};
use crate::media::{classify, ImageLink, Post, PostRef, ResolveReason, ResponseKind};

/// Size and shape an image must have to be kept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeLimits {
    pub min_width: u32,
    pub min_height: u32,
    pub min_aspect: f64,
    pub max_aspect: f64,
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            min_width: 0,
            min_height: 0,
            min_aspect: 0.0,
            max_aspect: f64::MAX,
        }
    }
}

impl SizeLimits {
    pub fn from_filters(filters: &FilterConfig) -> Self {
        Self {
            min_width: filters.min_width,
            min_height: filters.min_height,
            min_aspect: filters.min_aspect,
            max_aspect: filters.max_aspect,
        }
    }

    pub fn accepts(&self, width: u32, height: u32) -> bool {
        width >= self.min_width
            && height >= self.min_height
            && aspect_within(width, height, self.min_aspect, self.max_aspect)
    }
}

/// Downloads the images of gathered posts into the save directory.
pub struct Downloader {
    client: Arc<HttpClient>,
    store: Arc<DedupStore>,
    ledger: Arc<ContentLedger>,
    save_dir: PathBuf,
    limits: SizeLimits,
    concurrency: usize,
    show_downloads: bool,
    cancel: CancelToken,
    progress: Option<ProgressBar>,
}

impl Downloader {
    pub fn new(
        client: Arc<HttpClient>,
        config: &Config,
        store: Arc<DedupStore>,
        ledger: Arc<ContentLedger>,
        save_dir: PathBuf,
    ) -> Self {
        let cancel = client.cancel_token().clone();
        Self {
            client,
            store,
            ledger,
            save_dir,
            limits: SizeLimits::from_filters(&config.filters),
            concurrency: config.network.concurrency.max(1),
            show_downloads: config.options.show_downloads,
            cancel,
            progress: None,
        }
    }

    /// Advance `bar` by one for every post handled.
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    /// Download every post in order.
    ///
    /// A post's URLs are fetched in batches of `concurrency`; the next batch
    /// starts once the current one is done. Cancellation is honoured between
    /// posts and between batches, never inside one.
    pub async fn download(&self, posts: &[PostRef]) -> DownloadCounts {
        let mut counts = DownloadCounts::default();

        for (index, post) in posts.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::info!("Download cancelled after {} of {} posts", index, posts.len());
                break;
            }

            counts += self.download_post(post.as_ref()).await;

            if let Some(bar) = &self.progress {
                bar.inc(1);
            }
        }

        if let Some(bar) = &self.progress {
            bar.finish_and_clear();
        }

        counts
    }

    async fn download_post(&self, post: &dyn Post) -> DownloadCounts {
        let mut counts = DownloadCounts::default();
        let number = post.score();
        let result = post.resolve(&self.client).await;

        if !result.is_ok() {
            let reason = match result.reason {
                ResolveReason::Success => ResolveReason::Unknown,
                other => other,
            };
            tracing::debug!(
                "Post {} did not resolve ({}): {}",
                post.id(),
                reason,
                result.text.as_deref().unwrap_or("no detail")
            );
            if let Some(link_reason) = LinkReason::from_resolve(reason) {
                self.ledger
                    .record(ContentLink::new(post.post_url(), number, link_reason));
            }
            counts.record_unresolved(reason);
            return counts;
        }

        let single = result.links.len() == 1;
        let targets: Vec<_> = result
            .links
            .iter()
            .zip(self.destinations(post.id(), &result.links))
            .collect();

        for batch in targets.chunks(self.concurrency) {
            if self.cancel.is_cancelled() {
                break;
            }

            let outcomes = join_all(batch.iter().map(|(link, path)| {
                self.download_link(post, link, path.clone(), number, single)
            }))
            .await;

            for outcome in &outcomes {
                counts.record(outcome);
            }
        }

        counts
    }

    /// One destination per link of a post.
    ///
    /// Links whose file name is already taken by an earlier link of the same
    /// post get their 1-based position appended to the post id, so no two
    /// downloads of a batch share a path.
    fn destinations(&self, post_id: &str, links: &[ImageLink]) -> Vec<Option<PathBuf>> {
        let mut taken: HashSet<PathBuf> = HashSet::new();
        links
            .iter()
            .enumerate()
            .map(|(index, link)| {
                let mut path = destination_path(&self.save_dir, post_id, &link.url);
                if matches!(&path, Ok(p) if taken.contains(p)) {
                    let numbered = format!("{}-{}", post_id, index + 1);
                    path = destination_path(&self.save_dir, &numbered, &link.url);
                }
                match path {
                    Ok(path) if taken.insert(path.clone()) => Some(path),
                    Ok(path) => {
                        tracing::warn!("{} is claimed twice in post {}", path.display(), post_id);
                        None
                    }
                    Err(e) => {
                        tracing::warn!("No usable file name for {}: {}", link.url, e);
                        None
                    }
                }
            })
            .collect()
    }

    async fn download_link(
        &self,
        post: &dyn Post,
        link: &ImageLink,
        path: Option<PathBuf>,
        number: i64,
        single: bool,
    ) -> ImageOutcome {
        let Some(path) = path else {
            self.ledger_failure(link, number);
            return ImageOutcome::Failed;
        };

        if path.exists() {
            tracing::debug!("Skipping existing file: {}", path.display());
            return ImageOutcome::AlreadyDownloaded;
        }

        let response = match self.client.get(&link.url).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", link.url, e);
                self.ledger_failure(link, number);
                return ImageOutcome::Failed;
            }
        };

        match classify(response.status(), response.headers(), &link.url) {
            ResponseKind::Image => {}
            ResponseKind::Fail => {
                tracing::warn!("{} answered {}", link.url, response.status());
                self.ledger_failure(link, number);
                return ImageOutcome::Failed;
            }
            ResponseKind::Animated => {
                tracing::debug!("Animated content: {}", link.url);
                self.ledger
                    .record(ContentLink::new(&link.url, number, LinkReason::Animated));
                return ImageOutcome::Animated;
            }
            ResponseKind::NotImage => {
                tracing::debug!("Not an image: {}", link.url);
                return ImageOutcome::NotImage;
            }
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", link.url, e);
                self.ledger_failure(link, number);
                return ImageOutcome::Failed;
            }
        };

        let known = link
            .dimensions
            .or_else(|| if single { post.dimensions() } else { None });
        let (width, height) = match known.map(Ok).unwrap_or_else(|| image_dimensions(&bytes)) {
            Ok(dimensions) => dimensions,
            Err(e) => {
                tracing::debug!("Unreadable image header at {}: {}", link.url, e);
                return ImageOutcome::NotImage;
            }
        };

        if !self.limits.accepts(width, height) {
            tracing::debug!("Skipping {}x{} image: {}", width, height, link.url);
            return ImageOutcome::TooSmall;
        }

        let store = Arc::clone(&self.store);
        let uri = link.url.clone();
        let file = path.clone();
        let stored = tokio::task::spawn_blocking(move || {
            let candidate = Candidate {
                uri: &uri,
                file: &file,
                width,
                height,
            };
            let outcome = store.try_store(&bytes, candidate);
            (outcome, bytes)
        })
        .await;

        let (outcome, bytes) = match stored {
            Ok(stored) => stored,
            Err(e) => {
                tracing::error!("Hashing task for {} failed: {}", link.url, e);
                self.ledger_failure(link, number);
                return ImageOutcome::Failed;
            }
        };

        let key = match outcome {
            Ok(StoreOutcome::Accepted(key)) => key,
            Ok(StoreOutcome::Duplicate { existing }) => {
                tracing::debug!("{} duplicates {}", link.url, existing.display());
                return ImageOutcome::Duplicate;
            }
            Err(e) => {
                tracing::warn!("Could not hash {}: {}", link.url, e);
                self.ledger_failure(link, number);
                return ImageOutcome::Failed;
            }
        };

        if let Err(e) = persist_atomically(&path, &bytes).await {
            tracing::warn!("Failed to save {}: {}", path.display(), e);
            self.store.release(&key);
            self.ledger_failure(link, number);
            return ImageOutcome::PersistFailed;
        }

        if self.show_downloads {
            tracing::info!("Downloaded: {}", path.display());
        }
        ImageOutcome::Saved(path)
    }

    fn ledger_failure(&self, link: &ImageLink, number: i64) {
        self.ledger
            .record(ContentLink::new(&link.url, number, LinkReason::FailedDownload));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::DedupOptions;
    use crate::media::ImageResult;
    use crate::test_support::{
        checker_png, gradient_png, test_client, Canned, FakePost, TestServer,
    };
    use std::collections::HashMap;
    use std::path::Path;

    fn downloader(dir: &Path, config: &Config) -> (Downloader, Arc<DedupStore>, Arc<ContentLedger>) {
        let client = Arc::new(test_client(CancelToken::new()));
        let store = Arc::new(DedupStore::new(DedupOptions::default()));
        let ledger = Arc::new(ContentLedger::new());
        let downloader = Downloader::new(
            client,
            config,
            Arc::clone(&store),
            Arc::clone(&ledger),
            dir.to_path_buf(),
        );
        (downloader, store, ledger)
    }

    fn post_with_links(id: &str, urls: &[String]) -> PostRef {
        let links = urls.iter().map(|u| ImageLink::new(u.clone())).collect();
        FakePost::new(id, 0, 1)
            .with_result(ImageResult::success(links))
            .shared()
    }

    #[test]
    fn test_size_limits() {
        let limits = SizeLimits {
            min_width: 100,
            min_height: 100,
            min_aspect: 0.5,
            max_aspect: 2.0,
        };
        assert!(limits.accepts(100, 100));
        assert!(!limits.accepts(50, 50));
        assert!(!limits.accepts(500, 100));
        assert!(SizeLimits::default().accepts(1, 1));
    }

    #[tokio::test]
    async fn test_saves_images_and_counts_outcomes() {
        let mut routes = HashMap::new();
        routes.insert("/a.png".to_string(), Canned::png(gradient_png(64, 64, false)));
        routes.insert("/same.png".to_string(), Canned::png(gradient_png(64, 64, false)));
        routes.insert("/b.png".to_string(), Canned::png(checker_png(64, 64, 8)));
        routes.insert("/page".to_string(), Canned::new(200, "text/html", "<html></html>"));
        routes.insert("/clip".to_string(), Canned::new(200, "video/mp4", "mp4"));
        let server = TestServer::start(routes).await;

        let temp = tempfile::tempdir().unwrap();
        let (downloader, store, ledger) = downloader(temp.path(), &Config::default());
        let posts = vec![
            post_with_links("p1", &[server.url("/a.png"), server.url("/b.png")]),
            post_with_links("p2", &[server.url("/same.png")]),
            post_with_links("p3", &[server.url("/page"), server.url("/clip")]),
            FakePost::new("p4", 17, 1)
                .with_result(ImageResult::success(vec![ImageLink::new(server.url("/gone.png"))]))
                .shared(),
        ];

        let counts = downloader.download(&posts).await;

        assert_eq!(
            counts,
            DownloadCounts {
                downloaded: 2,
                duplicates: 1,
                failed: 1,
                skipped: 2,
            }
        );
        assert!(temp.path().join("p1_a.png").exists());
        assert!(temp.path().join("p1_b.png").exists());
        assert!(!temp.path().join("p2_same.png").exists());
        assert_eq!(store.len(), 2);

        // animated clip and the 404
        assert_eq!(ledger.len(), 2);
        ledger.flush(temp.path()).unwrap();
        let failed = std::fs::read_to_string(temp.path().join("Failed Downloads.txt")).unwrap();
        assert!(failed.contains("\n17 http://"));
        assert!(temp.path().join("Animated Content.txt").exists());
    }

    #[tokio::test]
    async fn test_links_are_fetched_in_bounded_batches() {
        let image = gradient_png(64, 64, false);
        let delay = std::time::Duration::from_millis(100);
        let paths: Vec<String> = (1..=7).map(|n| format!("/img{n}.png")).collect();
        let routes = paths
            .iter()
            .map(|path| (path.clone(), Canned::png(image.clone()).with_delay(delay)))
            .collect();
        let server = TestServer::start(routes).await;

        let mut config = Config::default();
        config.network.concurrency = 3;
        let temp = tempfile::tempdir().unwrap();
        let (downloader, _, _) = downloader(temp.path(), &config);
        let urls: Vec<String> = paths.iter().map(|path| server.url(path)).collect();

        let counts = downloader.download(&[post_with_links("p1", &urls)]).await;

        assert_eq!(server.hits(), 7);
        assert_eq!(server.peak_in_flight(), 3);
        assert_eq!(counts.total(), 7);
        assert_eq!(counts.downloaded, 1);
        assert_eq!(counts.duplicates, 6);
    }

    #[tokio::test]
    async fn test_long_remote_name_is_saved() {
        let path = format!("/{}.png", "n".repeat(300));
        let mut routes = HashMap::new();
        routes.insert(path.clone(), Canned::png(gradient_png(64, 64, false)));
        let server = TestServer::start(routes).await;

        let temp = tempfile::tempdir().unwrap();
        let (downloader, _, ledger) = downloader(temp.path(), &Config::default());
        let counts = downloader
            .download(&[post_with_links("p1", &[server.url(&path)])])
            .await;

        assert_eq!(counts.downloaded, 1);
        assert!(ledger.is_empty());
        assert_eq!(crate::fs::list_image_files(temp.path()).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_same_file_name_from_two_hosts() {
        let mut first = HashMap::new();
        first.insert("/x.png".to_string(), Canned::png(gradient_png(64, 64, false)));
        let mut second = HashMap::new();
        second.insert("/x.png".to_string(), Canned::png(checker_png(64, 64, 8)));
        let first = TestServer::start(first).await;
        let second = TestServer::start(second).await;

        let temp = tempfile::tempdir().unwrap();
        let (downloader, _, _) = downloader(temp.path(), &Config::default());
        let post = post_with_links("p1", &[first.url("/x.png"), second.url("/x.png")]);

        let counts = downloader.download(&[post]).await;

        assert_eq!(counts.downloaded, 2);
        assert!(temp.path().join("p1_x.png").exists());
        assert!(temp.path().join("p1-2_x.png").exists());
    }

    #[tokio::test]
    async fn test_existing_destination_is_not_fetched() {
        let mut routes = HashMap::new();
        routes.insert("/a.png".to_string(), Canned::png(gradient_png(64, 64, false)));
        let server = TestServer::start(routes).await;

        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("p1_a.png"), b"already here").unwrap();
        let (downloader, store, ledger) = downloader(temp.path(), &Config::default());

        let counts = downloader
            .download(&[post_with_links("p1", &[server.url("/a.png")])])
            .await;

        assert_eq!(counts.skipped, 1);
        assert_eq!(server.hits(), 0);
        assert!(store.is_empty());
        assert!(ledger.is_empty());
        assert_eq!(
            std::fs::read(temp.path().join("p1_a.png")).unwrap(),
            b"already here"
        );
    }

    #[tokio::test]
    async fn test_second_run_saves_nothing_new() {
        let mut routes = HashMap::new();
        routes.insert("/a.png".to_string(), Canned::png(gradient_png(64, 64, true)));
        let server = TestServer::start(routes).await;
        let temp = tempfile::tempdir().unwrap();
        let posts = vec![post_with_links("p1", &[server.url("/a.png")])];

        let (first, _, _) = downloader(temp.path(), &Config::default());
        assert_eq!(first.download(&posts).await.downloaded, 1);

        let (second, _, _) = downloader(temp.path(), &Config::default());
        let counts = second.download(&posts).await;

        assert_eq!(counts.downloaded, 0);
        assert_eq!(counts.skipped, 1);
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn test_small_images_are_never_stored() {
        let mut routes = HashMap::new();
        routes.insert("/small.png".to_string(), Canned::png(gradient_png(50, 50, false)));
        routes.insert("/big.png".to_string(), Canned::png(checker_png(120, 120, 10)));
        let server = TestServer::start(routes).await;

        let mut config = Config::default();
        config.filters.min_width = 100;
        config.filters.min_height = 100;

        let temp = tempfile::tempdir().unwrap();
        let (downloader, store, ledger) = downloader(temp.path(), &config);
        let counts = downloader
            .download(&[post_with_links(
                "p1",
                &[server.url("/small.png"), server.url("/big.png")],
            )])
            .await;

        assert_eq!(counts.downloaded, 1);
        assert_eq!(counts.skipped, 1);
        assert_eq!(store.len(), 1);
        assert!(ledger.is_empty());
        assert!(!temp.path().join("p1_small.png").exists());
    }

    #[tokio::test]
    async fn test_unresolved_posts_are_ledgered() {
        let temp = tempfile::tempdir().unwrap();
        let (downloader, _, ledger) = downloader(temp.path(), &Config::default());
        let posts = vec![
            FakePost::new("p1", 0, 1)
                .with_result(ImageResult::failure(ResolveReason::NotFound, "deleted"))
                .shared(),
            FakePost::new("p2", 0, 1)
                .with_result(ImageResult::failure(ResolveReason::Animated, "gifv"))
                .shared(),
        ];

        let counts = downloader.download(&posts).await;

        assert_eq!(counts.failed, 1);
        assert_eq!(counts.skipped, 1);
        assert_eq!(ledger.len(), 2);
        ledger.flush(temp.path()).unwrap();
        assert!(temp.path().join("Not Found.txt").exists());
        assert!(temp.path().join("Animated Content.txt").exists());
    }

    #[tokio::test]
    async fn test_cancelled_run_downloads_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let cancel = CancelToken::new();
        let client = Arc::new(test_client(cancel.clone()));
        let ledger = Arc::new(ContentLedger::new());
        let downloader = Downloader::new(
            client,
            &Config::default(),
            Arc::new(DedupStore::default()),
            Arc::clone(&ledger),
            temp.path().to_path_buf(),
        );
        cancel.cancel();

        let counts = downloader
            .download(&[FakePost::new("p1", 0, 1).shared()])
            .await;

        assert_eq!(counts.total(), 0);
        assert!(ledger.is_empty());
    }
}
