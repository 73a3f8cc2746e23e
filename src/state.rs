// src/state.rs
//! Durable record of what has been done: published records, the handled
//! id set, per-day counters, rotation history.
//!
//! The store persists synchronously on every mutation (write to a temp
//! file, then rename) so a restart never loses more than the in-flight
//! action. A state file that exists but does not parse is fatal; treating
//! it as empty would silently re-publish handled candidates.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StateError;
use crate::rotation::Archetype;

/// Rotation history is bounded; older entries are dropped.
pub const ROTATION_HISTORY_CAP: usize = 20;

/// Persisted once an artifact is successfully published. Never mutated,
/// never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishedRecord {
    /// Identifier of the source candidate this artifact was made from.
    pub candidate_id: String,
    /// Identifier assigned by the publishing platform.
    pub published_id: String,
    pub text: String,
    /// sha256 prefix of `text`, for audit/dedup of near-identical output.
    pub text_hash: String,
    pub archetype: Archetype,
    pub published_at: DateTime<Utc>,
    /// For reply-type artifacts: who and what we replied to (audit only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_text: Option<String>,
}

/// The aggregate persisted object. Ordered/sorted collections keep the
/// serialized form stable, so an unmutated load-save round trip is
/// byte-identical.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CycleState {
    #[serde(default)]
    pub records: Vec<PublishedRecord>,
    /// Candidate ids already acted on; O(1) dedup index over `records`.
    #[serde(default)]
    pub handled: BTreeSet<String>,
    /// Hashes of published texts (audit-level duplicate detection).
    #[serde(default)]
    pub text_hashes: BTreeSet<String>,
    /// Action counts keyed by calendar date ("YYYY-MM-DD") in the
    /// configured timezone.
    #[serde(default)]
    pub daily_counts: BTreeMap<String, u32>,
    /// Last N archetypes used, oldest first.
    #[serde(default)]
    pub rotation_history: Vec<Archetype>,
    #[serde(default)]
    pub last_action_at: Option<DateTime<Utc>>,
}

/// 16-hex-char sha256 prefix, enough for duplicate detection.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

fn day_key(ts: DateTime<Utc>, tz: &FixedOffset) -> String {
    ts.with_timezone(tz).format("%Y-%m-%d").to_string()
}

/// Owner and sole mutator of `CycleState`.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    state: CycleState,
}

impl StateStore {
    /// Load durable state, or start fresh when the file is absent.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();
        let state = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw).map_err(|e| StateError::Corrupt {
                path: path.display().to_string(),
                detail: e.to_string(),
            })?
        } else {
            CycleState::default()
        };
        Ok(Self { path, state })
    }

    pub fn state(&self) -> &CycleState {
        &self.state
    }

    pub fn is_handled(&self, candidate_id: &str) -> bool {
        self.state.handled.contains(candidate_id)
    }

    pub fn is_duplicate_text(&self, text: &str) -> bool {
        self.state.text_hashes.contains(&content_hash(text))
    }

    /// Per-day counter lookup. The caller supplies the date already
    /// resolved in the configured timezone.
    pub fn count_actions_on(&self, date: NaiveDate) -> u32 {
        self.state
            .daily_counts
            .get(&date.format("%Y-%m-%d").to_string())
            .copied()
            .unwrap_or(0)
    }

    /// `None` if no action was ever recorded.
    pub fn time_since_last_action(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.state.last_action_at.map(|last| now - last)
    }

    /// Texts of the most recent records, newest last. Used for
    /// near-duplicate candidate skipping.
    pub fn recent_texts(&self, limit: usize) -> Vec<&str> {
        let start = self.state.records.len().saturating_sub(limit);
        self.state.records[start..]
            .iter()
            .map(|r| r.text.as_str())
            .collect()
    }

    pub fn rotation_history(&self) -> &[Archetype] {
        &self.state.rotation_history
    }

    /// Append the record, update the handled set, text hashes, the
    /// per-day counter (in `tz`) and the bounded rotation history, then
    /// persist synchronously. The in-memory mutation is only kept if the
    /// durable write succeeds.
    pub fn record_published(
        &mut self,
        record: PublishedRecord,
        tz: &FixedOffset,
    ) -> Result<(), StateError> {
        let before = self.state.clone();

        let key = day_key(record.published_at, tz);
        *self.state.daily_counts.entry(key).or_insert(0) += 1;
        self.state.handled.insert(record.candidate_id.clone());
        self.state.text_hashes.insert(record.text_hash.clone());
        self.state.rotation_history.push(record.archetype);
        if self.state.rotation_history.len() > ROTATION_HISTORY_CAP {
            let excess = self.state.rotation_history.len() - ROTATION_HISTORY_CAP;
            self.state.rotation_history.drain(0..excess);
        }
        self.state.last_action_at = Some(record.published_at);
        self.state.records.push(record);

        if let Err(e) = self.persist() {
            self.state = before;
            return Err(e);
        }
        Ok(())
    }

    /// Atomic write: temp file in the same directory, then rename.
    fn persist(&self) -> Result<(), StateError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&self.state).map_err(|e| StateError::Corrupt {
            path: self.path.display().to_string(),
            detail: e.to_string(),
        })?;
        let mut f = fs::File::create(&tmp)?;
        f.write_all(json.as_bytes())?;
        f.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
