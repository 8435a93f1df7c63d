//! Fixtures shared by unit tests.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use image::{DynamicImage, GrayImage, ImageFormat};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::api::HttpClient;
use crate::cancel::CancelToken;
use crate::config::NetworkConfig;
use crate::error::{Error, Result};
use crate::media::{ImageLink, ImageResult, Post, PostRef};
use crate::source::{Continuation, Page, SourceAdapter};

/// Encode a grayscale PNG whose pixels come from `pixel(x, y)`.
pub fn png(width: u32, height: u32, pixel: impl Fn(u32, u32) -> u8) -> Vec<u8> {
    let image = GrayImage::from_fn(width, height, |x, y| image::Luma([pixel(x, y)]));
    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// A smooth gradient running left to right, or top to bottom.
pub fn gradient_png(width: u32, height: u32, vertical: bool) -> Vec<u8> {
    png(width, height, move |x, y| {
        let (pos, len) = if vertical { (y, height) } else { (x, width) };
        ((pos * 255) / len.max(1)) as u8
    })
}

/// A checkerboard with `cell`-pixel squares.
pub fn checker_png(width: u32, height: u32, cell: u32) -> Vec<u8> {
    png(width, height, move |x, y| {
        if ((x / cell) + (y / cell)) % 2 == 0 {
            230
        } else {
            20
        }
    })
}

/// Client with no politeness delay and quick backoff.
pub fn test_client(cancel: CancelToken) -> HttpClient {
    let config = NetworkConfig {
        request_delay_ms: 0,
        initial_wait_ms: 1,
        ..NetworkConfig::default()
    };
    let builder = reqwest::Client::builder()
        .no_proxy()
        .timeout(config.timeout());
    HttpClient::from_builder(builder, &config, cancel).unwrap()
}

/// A post whose resolver returns a fixed result.
#[derive(Debug, Clone)]
pub struct FakePost {
    pub id: String,
    pub score: i64,
    pub created_at: DateTime<Utc>,
    pub dimensions: Option<(u32, u32)>,
    pub result: ImageResult,
}

impl FakePost {
    pub fn new(id: &str, score: i64, age_hours: i64) -> Self {
        Self {
            id: id.to_string(),
            score,
            created_at: Utc::now() - Duration::hours(age_hours),
            dimensions: None,
            result: ImageResult::success(vec![ImageLink::new(format!(
                "http://127.0.0.1:9/{id}.png"
            ))]),
        }
    }

    pub fn with_result(mut self, result: ImageResult) -> Self {
        self.result = result;
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions = Some((width, height));
        self
    }

    pub fn shared(self) -> PostRef {
        Arc::new(self)
    }
}

#[async_trait]
impl Post for FakePost {
    fn id(&self) -> &str {
        &self.id
    }

    fn post_url(&self) -> &str {
        "http://127.0.0.1:9/post"
    }

    fn score(&self) -> i64 {
        self.score
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    async fn resolve(&self, _client: &HttpClient) -> ImageResult {
        self.result.clone()
    }
}

/// In-memory paged source. Pages are served in order; an `Err` entry fails.
pub struct FakeSource {
    pages: Vec<std::result::Result<Vec<PostRef>, String>>,
    /// Claim more pages after the last one (an unbounded, lying listing).
    pub endless: bool,
    pub time_sorted: bool,
    pub requested: AtomicUsize,
    pub cancel_after_page: Option<(usize, CancelToken)>,
}

impl FakeSource {
    pub fn new(pages: Vec<Vec<PostRef>>) -> Self {
        Self {
            pages: pages.into_iter().map(Ok).collect(),
            endless: false,
            time_sorted: true,
            requested: AtomicUsize::new(0),
            cancel_after_page: None,
        }
    }

    pub fn with_failure(mut self, message: &str) -> Self {
        self.pages.push(Err(message.to_string()));
        self
    }

    pub fn requested(&self) -> usize {
        self.requested.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for FakeSource {
    type Cursor = usize;

    fn name(&self) -> &str {
        "fake"
    }

    fn is_time_sorted(&self) -> bool {
        self.time_sorted
    }

    async fn next_page(
        &self,
        _client: &HttpClient,
        cursor: Option<usize>,
    ) -> Result<Page<usize>> {
        self.requested.fetch_add(1, Ordering::SeqCst);
        let index = cursor.unwrap_or(0);

        if let Some((after, token)) = &self.cancel_after_page {
            if index >= *after {
                token.cancel();
            }
        }

        let posts = match self.pages.get(index) {
            Some(Ok(posts)) => posts.clone(),
            Some(Err(message)) => return Err(Error::adapter("fake", message.clone())),
            None => Vec::new(),
        };

        let continuation = if index + 1 < self.pages.len() || self.endless {
            Continuation::Next(index + 1)
        } else {
            Continuation::Done
        };

        Ok(Page {
            posts,
            continuation,
        })
    }
}

/// Unbounded source producing `unique` distinct ids, cycling afterwards.
pub struct CyclingSource {
    pub unique: usize,
    pub page_size: usize,
    pub scores: HashMap<usize, i64>,
}

#[async_trait]
impl SourceAdapter for CyclingSource {
    type Cursor = usize;

    fn name(&self) -> &str {
        "cycling"
    }

    async fn next_page(
        &self,
        _client: &HttpClient,
        cursor: Option<usize>,
    ) -> Result<Page<usize>> {
        let start = cursor.unwrap_or(0);
        let posts = (start..start + self.page_size)
            .map(|n| {
                let id = n % self.unique;
                let score = self.scores.get(&id).copied().unwrap_or(id as i64);
                FakePost::new(&format!("post{id}"), score, 1).shared()
            })
            .collect();

        Ok(Page {
            posts,
            continuation: Continuation::Next(start + self.page_size),
        })
    }
}

/// A fixed HTTP response.
#[derive(Debug, Clone)]
pub struct Canned {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// How long the server holds the request before answering.
    pub delay: std::time::Duration,
}

impl Canned {
    pub fn new(status: u16, content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
            delay: std::time::Duration::ZERO,
        }
    }

    pub fn png(body: Vec<u8>) -> Self {
        Self::new(200, "image/png", body)
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Default)]
struct ServerCounters {
    hits: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// Loopback HTTP server answering each path with a canned response.
/// Unknown paths get a 404.
pub struct TestServer {
    base: String,
    counters: Arc<ServerCounters>,
}

impl TestServer {
    pub async fn start(routes: HashMap<String, Canned>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let routes = Arc::new(routes);
        let counters = Arc::new(ServerCounters::default());

        let shared = Arc::clone(&counters);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let routes = Arc::clone(&routes);
                let counters = Arc::clone(&shared);
                tokio::spawn(async move {
                    if let Err(e) = answer(stream, &routes, &counters).await {
                        eprintln!("test server could not answer a request: {}", e);
                    }
                });
            }
        });

        Self { base, counters }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Requests served so far.
    pub fn hits(&self) -> usize {
        self.counters.hits.load(Ordering::SeqCst)
    }

    /// Most requests held by the server at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }
}

async fn answer(
    mut stream: TcpStream,
    routes: &HashMap<String, Canned>,
    counters: &ServerCounters,
) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await? {
            0 => return Ok(()),
            n => request.extend_from_slice(&chunk[..n]),
        }
    }
    counters.hits.fetch_add(1, Ordering::SeqCst);

    let request = String::from_utf8_lossy(&request);
    let path = request.split_whitespace().nth(1).unwrap_or("/");
    let canned = routes
        .get(path)
        .cloned()
        .unwrap_or_else(|| Canned::new(404, "text/plain", "missing"));

    // In flight until the response starts.
    let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    counters.peak.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(canned.delay).await;
    counters.in_flight.fetch_sub(1, Ordering::SeqCst);

    let head = format!(
        "HTTP/1.1 {} Canned\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        canned.status,
        canned.content_type,
        canned.body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(&canned.body).await?;
    stream.shutdown().await
}
