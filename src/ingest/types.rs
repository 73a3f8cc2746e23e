// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An unpublished unit of content under consideration for an action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    /// Stable identifier, unique within one scoring batch (feed URL,
    /// post id, ...). Candidates whose id is already in the handled set
    /// are excluded before scoring.
    pub id: String,
    /// Origin tag, e.g. "hn-rss" or "timeline".
    pub origin: String,
    pub text: String,
    /// Author handle, when the source knows it.
    pub author_handle: Option<String>,
    /// Follower-count estimate; `None` scores neutral.
    pub author_followers: Option<u64>,
    pub likes: u64,
    pub shares: u64,
    pub replies: u64,
    /// Observed/approximate publication time.
    pub published_at: Option<DateTime<Utc>>,
    /// Repost/retweet-equivalents are hard-excluded from scoring.
    pub is_repost: bool,
    pub is_quote: bool,
    /// Set by real-time sources; grants the fixed recency score.
    pub from_live_feed: bool,
    /// Per-source weight carried from configuration.
    pub source_weight: f32,
}

impl Candidate {
    /// Minimal constructor; engagement and flags default to zero/false.
    pub fn new(id: impl Into<String>, origin: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            origin: origin.into(),
            text: text.into(),
            author_handle: None,
            author_followers: None,
            likes: 0,
            shares: 0,
            replies: 0,
            published_at: None,
            is_repost: false,
            is_quote: false,
            from_live_feed: false,
            source_weight: 1.0,
        }
    }
}

/// A pull-based content source (RSS feed, article extractor, ...).
/// Fetch failures are per-source: the cycle logs and moves on.
#[async_trait::async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Candidate>>;
    fn name(&self) -> &str;
}

/// A live timeline polled once per cycle alongside the pull sources;
/// its candidates are stamped `from_live_feed` at ingest. Same failure
/// contract as `ContentSource`.
#[async_trait::async_trait]
pub trait TimelineSource: Send + Sync {
    async fn poll(&self) -> Result<Vec<Candidate>>;
    fn name(&self) -> &str;
}
