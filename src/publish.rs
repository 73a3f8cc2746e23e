// src/publish.rs
//! Publishing client and the publish orchestrator. The orchestrator
//! owns the one law the rest of the system relies on: durable state is
//! mutated if and only if the platform accepted the post.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use metrics::counter;
use tracing::{error, info, warn};

use crate::config::{PublishConfig, Settings};
use crate::error::{CycleError, PublishError};
use crate::generation::Drafter;
use crate::guard::{can_act_now, Decision, DenyReason};
use crate::ingest::types::Candidate;
use crate::rotation::Archetype;
use crate::state::{content_hash, PublishedRecord, StateStore};

/// Platform client. One method; retries and error classification live
/// inside the implementation.
#[async_trait]
pub trait PublishingClient: Send + Sync {
    /// Post `text`, optionally as a reply. Returns the platform-assigned
    /// id of the created post.
    async fn publish(&self, text: &str, in_reply_to: Option<&str>) -> Result<String, PublishError>;
}

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 500;

/// HTTP publisher posting JSON to the configured platform endpoint.
pub struct HttpPublisher {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl HttpPublisher {
    pub fn new(cfg: &PublishConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("social-autopilot/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            http,
            endpoint: cfg.endpoint.clone(),
            token: cfg.token.clone(),
        }
    }

    async fn post_once(
        &self,
        text: &str,
        in_reply_to: Option<&str>,
    ) -> Result<String, PublishError> {
        #[derive(serde::Serialize)]
        struct Req<'a> {
            text: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            in_reply_to: Option<&'a str>,
        }
        #[derive(serde::Deserialize)]
        struct Resp {
            id: String,
        }

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&Req { text, in_reply_to })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PublishError::Timeout
                } else {
                    PublishError::Http(e.to_string())
                }
            })?;

        let status = resp.status();
        match status.as_u16() {
            429 => Err(PublishError::RateLimited),
            401 | 403 => Err(PublishError::Auth),
            _ if status.is_success() => {
                let body: Resp = resp
                    .json()
                    .await
                    .map_err(|e| PublishError::Http(format!("bad response body: {e}")))?;
                Ok(body.id)
            }
            _ => Err(PublishError::Http(format!("http {status}"))),
        }
    }
}

#[async_trait]
impl PublishingClient for HttpPublisher {
    async fn publish(&self, text: &str, in_reply_to: Option<&str>) -> Result<String, PublishError> {
        let mut attempt = 0u32;
        loop {
            match self.post_once(text, in_reply_to).await {
                Ok(id) => return Ok(id),
                // Auth and rate limits do not improve on retry.
                Err(e @ (PublishError::Auth | PublishError::RateLimited)) => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt >= MAX_ATTEMPTS {
                        return Err(e);
                    }
                    let backoff = Duration::from_millis(BACKOFF_BASE_MS << attempt);
                    warn!(error = %e, attempt, backoff_ms = backoff.as_millis() as u64, "publish failed, backing off");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// What one publish attempt amounted to. `Skipped` is normal operation,
/// not a failure.
#[derive(Debug)]
pub enum Outcome {
    Published(PublishedRecord),
    Skipped(DenyReason),
    Failed(CycleError),
}

/// Guard, draft, publish, record. Ordering matters: the cadence guard
/// runs before any generation spend, and `record_published` runs only
/// after the platform confirmed the post. A publish timeout is treated
/// as failed without recording; at-most-once delivery loses over a
/// silent duplicate here.
pub async fn attempt_publish(
    store: &mut StateStore,
    settings: &Settings,
    tz: &FixedOffset,
    drafter: &Drafter,
    publisher: &dyn PublishingClient,
    candidate: &Candidate,
    archetype: Archetype,
    now: DateTime<Utc>,
) -> Outcome {
    if let Decision::Denied(reason) = can_act_now(store, settings, tz, now) {
        info!(%reason, "cycle skipped by cadence guard");
        counter!("publish_skipped_total").increment(1);
        return Outcome::Skipped(reason);
    }

    let text = match drafter.draft(candidate, archetype).await {
        Ok(text) => text,
        Err(e) => {
            error!(error = %e, candidate = %candidate.id, "drafting failed");
            counter!("publish_failed_total").increment(1);
            return Outcome::Failed(e);
        }
    };

    // Only live-feed candidates are posts we answer; articles and feed
    // items become standalone posts.
    let is_reply = candidate.from_live_feed;
    let in_reply_to = is_reply.then(|| candidate.id.as_str());

    let published_id = match publisher.publish(&text, in_reply_to).await {
        Ok(id) => id,
        Err(e) => {
            error!(error = %e, candidate = %candidate.id, "platform rejected the post");
            counter!("publish_failed_total").increment(1);
            return Outcome::Failed(e.into());
        }
    };

    let record = PublishedRecord {
        candidate_id: candidate.id.clone(),
        published_id,
        text_hash: content_hash(&text),
        text,
        archetype,
        published_at: now,
        reply_to_author: if is_reply {
            candidate.author_handle.clone()
        } else {
            None
        },
        reply_to_text: is_reply.then(|| candidate.text.clone()),
    };

    if let Err(e) = store.record_published(record.clone(), tz) {
        // The post is live but the ledger write failed. Fatal: running
        // on without a trustworthy ledger risks duplicates.
        error!(error = %e, published_id = %record.published_id, "post is live but state persist failed");
        return Outcome::Failed(e.into());
    }

    info!(
        published_id = %record.published_id,
        candidate = %candidate.id,
        archetype = %archetype,
        chars = record.text.chars().count(),
        "published"
    );
    counter!("publish_published_total").increment(1);
    Outcome::Published(record)
}

/// In-memory publisher for tests and dry runs.
pub struct MockPublisher {
    pub fail_with: Option<fn() -> PublishError>,
    pub published: std::sync::Mutex<Vec<String>>,
    /// One entry per accepted call: the `in_reply_to` it was sent with.
    pub reply_targets: std::sync::Mutex<Vec<Option<String>>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl MockPublisher {
    pub fn accepting() -> Self {
        Self {
            fail_with: None,
            published: std::sync::Mutex::new(Vec::new()),
            reply_targets: std::sync::Mutex::new(Vec::new()),
            next_id: std::sync::atomic::AtomicU64::new(1),
        }
    }

    pub fn failing(make: fn() -> PublishError) -> Self {
        Self {
            fail_with: Some(make),
            published: std::sync::Mutex::new(Vec::new()),
            reply_targets: std::sync::Mutex::new(Vec::new()),
            next_id: std::sync::atomic::AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl PublishingClient for MockPublisher {
    async fn publish(&self, text: &str, in_reply_to: Option<&str>) -> Result<String, PublishError> {
        if let Some(make) = self.fail_with {
            return Err(make());
        }
        let n = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.published
            .lock()
            .expect("mock publisher lock")
            .push(text.to_string());
        self.reply_targets
            .lock()
            .expect("mock publisher lock")
            .push(in_reply_to.map(str::to_string));
        Ok(format!("post-{n}"))
    }
}
