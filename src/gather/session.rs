//! Paging a source until enough posts are collected.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::api::HttpClient;
use crate::cancel::CancelToken;
use crate::error::Error;
use crate::gather::rules::{MaxAge, ValidationRule, Verdict};
use crate::media::{Post, PostRef};
use crate::source::{Continuation, SourceAdapter};

/// Default number of consecutive pages without new posts tolerated.
pub const DEFAULT_EMPTY_PAGE_RETRIES: u32 = 1;

#[derive(Debug, Default)]
struct GatherState {
    posts: Vec<PostRef>,
    ids: HashSet<String>,
}

enum Admission {
    Added(usize),
    Known,
    Closed,
}

/// Collects up to `target` distinct posts from one source.
///
/// The session owns a child of the run's cancel token: stopping the session
/// (target reached, age limit hit) leaves the run going, while cancelling
/// the run also stops the session.
pub struct GatherSession {
    target: usize,
    cutoff: Option<DateTime<Utc>>,
    rules: Vec<Box<dyn ValidationRule>>,
    empty_page_retries: u32,
    cancel: CancelToken,
    state: Mutex<GatherState>,
}

impl GatherSession {
    pub fn new(target: usize, run_token: &CancelToken) -> Self {
        Self {
            target,
            cutoff: None,
            rules: Vec::new(),
            empty_page_retries: DEFAULT_EMPTY_PAGE_RETRIES,
            cancel: run_token.child(),
            state: Mutex::new(GatherState::default()),
        }
    }

    /// Skip posts created before `cutoff`, stopping early on newest-first sources.
    pub fn with_cutoff(mut self, cutoff: DateTime<Utc>) -> Self {
        self.cutoff = Some(cutoff);
        self
    }

    pub fn with_rule(mut self, rule: impl ValidationRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn with_rules(mut self, rules: Vec<Box<dyn ValidationRule>>) -> Self {
        self.rules.extend(rules);
        self
    }

    pub fn with_empty_page_retries(mut self, retries: u32) -> Self {
        self.empty_page_retries = retries;
        self
    }

    /// Token that stops this session when cancelled.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Number of posts collected so far.
    pub fn count(&self) -> usize {
        self.state.lock().posts.len()
    }

    /// Page through `adapter` and return the collected posts, highest score first.
    ///
    /// Adapter failures end gathering; whatever was collected until then is
    /// still returned.
    pub async fn run<A: SourceAdapter>(&self, adapter: &A, client: &HttpClient) -> Vec<PostRef> {
        if self.target == 0 {
            return Vec::new();
        }

        let age_rule = self
            .cutoff
            .map(|cutoff| MaxAge::new(cutoff, adapter.is_time_sorted()));
        let mut rules: Vec<&dyn ValidationRule> = self.rules.iter().map(|r| r.as_ref()).collect();
        if let Some(rule) = &age_rule {
            rules.push(rule);
        }
        rules.sort_by_key(|rule| rule.priority());

        tracing::info!("Gathering up to {} posts from {}", self.target, adapter.name());

        let mut cursor: Option<A::Cursor> = None;
        // Every id met so far, ignored posts included.
        let mut seen: HashSet<String> = HashSet::new();
        let mut empty_pages = 0u32;
        let mut page_number = 0usize;

        'pages: loop {
            if self.cancel.is_cancelled() {
                break;
            }

            if page_number > 0 && !client.pause().await {
                break;
            }
            page_number += 1;

            let page = match adapter.next_page(client, cursor.take()).await {
                Ok(page) => page,
                Err(Error::Cancelled) => break,
                Err(e) => {
                    tracing::warn!("Stopped gathering from {}: {}", adapter.name(), e);
                    break;
                }
            };
            tracing::debug!("Page {}: {} posts", page_number, page.posts.len());

            let mut fresh = 0usize;
            for post in page.posts {
                if self.cancel.is_cancelled() {
                    break 'pages;
                }

                if seen.insert(post.id().to_string()) {
                    fresh += 1;
                }

                match evaluate(&rules, post.as_ref()) {
                    Verdict::Continue => {}
                    Verdict::Ignore => continue,
                    Verdict::Stop => {
                        tracing::info!("Post {} ends gathering", post.id());
                        self.cancel.cancel();
                        break 'pages;
                    }
                }

                match self.admit(post) {
                    Admission::Added(count) => {
                        if count >= self.target {
                            tracing::debug!("Gathered target of {} posts", self.target);
                            self.cancel.cancel();
                            break 'pages;
                        }
                    }
                    Admission::Known => {}
                    Admission::Closed => break 'pages,
                }
            }

            match page.continuation {
                Continuation::Done => break,
                Continuation::Next(next) => cursor = Some(next),
            }

            if fresh == 0 {
                empty_pages += 1;
                if empty_pages > self.empty_page_retries {
                    tracing::debug!("No unseen posts in {} pages, stopping", empty_pages);
                    break;
                }
            } else {
                empty_pages = 0;
            }
        }

        let posts = self.results();
        tracing::info!("Gathered {} posts from {}", posts.len(), adapter.name());
        posts
    }

    /// Insert `post` unless the session is closed or already holds its id.
    fn admit(&self, post: PostRef) -> Admission {
        let mut state = self.state.lock();
        if self.cancel.is_cancelled() {
            return Admission::Closed;
        }
        if !state.ids.insert(post.id().to_string()) {
            return Admission::Known;
        }
        state.posts.push(post);
        Admission::Added(state.posts.len())
    }

    fn results(&self) -> Vec<PostRef> {
        let mut posts = self.state.lock().posts.clone();
        posts.sort_by(|a, b| b.score().cmp(&a.score()));
        posts
    }
}

fn evaluate(rules: &[&dyn ValidationRule], post: &dyn Post) -> Verdict {
    for rule in rules {
        let verdict = rule.check(post);
        if verdict != Verdict::Continue {
            tracing::trace!("Post {} rejected by {}: {:?}", post.id(), rule.name(), verdict);
            return verdict;
        }
    }
    Verdict::Continue
}
