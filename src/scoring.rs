// src/scoring.rs
//! Candidate scorer: weighted linear combination of topic relevance,
//! engagement, author-fit and recency, with hard exclusions applied
//! before any weighting.
//!
//! Default weights (0.35 / 0.30 / 0.20 / 0.15) and sub-score formulas
//! are calibration defaults carried in `ScoringConfig`, not constants.

use tracing::debug;

use crate::config::{CadenceConfig, ScoringConfig};
use crate::ingest::types::Candidate;

/// A candidate plus its score and the per-dimension breakdown.
/// Ephemeral; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: f32,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoreBreakdown {
    pub topic: f32,
    pub engagement: f32,
    pub author: f32,
    pub recency: f32,
}

pub struct CandidateScorer<'a> {
    scoring: &'a ScoringConfig,
    cadence: &'a CadenceConfig,
    topics: Vec<String>,
    muted: Vec<String>,
}

impl<'a> CandidateScorer<'a> {
    pub fn new(scoring: &'a ScoringConfig, cadence: &'a CadenceConfig) -> Self {
        let topics = scoring
            .boost_topics
            .iter()
            .map(|t| t.to_lowercase())
            .collect();
        let muted = scoring
            .mute_topics
            .iter()
            .map(|t| t.to_lowercase())
            .collect();
        Self {
            scoring,
            cadence,
            topics,
            muted,
        }
    }

    /// Score one candidate in [0.0, 1.0]. Hard exclusions (already
    /// handled, repost, muted topic) yield 0.0 regardless of weights.
    pub fn score(&self, candidate: &Candidate, is_handled: &dyn Fn(&str) -> bool) -> ScoredCandidate {
        let excluded = is_handled(&candidate.id)
            || candidate.is_repost
            || candidate.text.trim().is_empty()
            || self.is_muted(&candidate.text);
        if excluded {
            debug!(candidate = %candidate.id, "hard-excluded from scoring");
            return ScoredCandidate {
                candidate: candidate.clone(),
                score: 0.0,
                breakdown: ScoreBreakdown::default(),
            };
        }

        let breakdown = ScoreBreakdown {
            topic: (self.topic_score(&candidate.text) * candidate.source_weight).min(1.0),
            engagement: self.engagement_score(candidate),
            author: self.author_score(candidate.author_followers),
            recency: self.recency_score(candidate),
        };

        let w = &self.scoring.weights;
        let score = breakdown.topic * w.topic
            + breakdown.engagement * w.engagement
            + breakdown.author * w.author
            + breakdown.recency * w.recency;

        debug!(
            candidate = %candidate.id,
            topic = breakdown.topic,
            engagement = breakdown.engagement,
            author = breakdown.author,
            recency = breakdown.recency,
            total = score,
            "scored candidate"
        );

        ScoredCandidate {
            candidate: candidate.clone(),
            score,
            breakdown,
        }
    }

    /// Score a batch, drop everything below the threshold, sort
    /// descending. Empty input is an empty output, not an error.
    pub fn score_and_rank(
        &self,
        candidates: &[Candidate],
        is_handled: &dyn Fn(&str) -> bool,
    ) -> Vec<ScoredCandidate> {
        let mut ranked: Vec<ScoredCandidate> = candidates
            .iter()
            .map(|c| self.score(c, is_handled))
            .filter(|s| s.score >= self.scoring.score_threshold)
            .collect();
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }

    /// Pick the best ranked candidate that is not a near-duplicate of
    /// recently published texts (Jaro-Winkler similarity).
    pub fn select_best(
        &self,
        ranked: Vec<ScoredCandidate>,
        recent_texts: &[&str],
    ) -> Option<ScoredCandidate> {
        let threshold = self.scoring.similarity_threshold;
        ranked.into_iter().find(|s| {
            let similar = recent_texts.iter().any(|recent| {
                strsim::jaro_winkler(
                    &s.candidate.text.to_lowercase(),
                    &recent.to_lowercase(),
                ) >= threshold
            });
            if similar {
                debug!(candidate = %s.candidate.id, "skipped as near-duplicate of recent output");
            }
            !similar
        })
    }

    /// Any muted topic present means the candidate is off the table,
    /// whatever its other signals.
    fn is_muted(&self, text: &str) -> bool {
        if self.muted.is_empty() {
            return false;
        }
        let lower = text.to_lowercase();
        self.muted.iter().any(|t| lower.contains(t.as_str()))
    }

    /// 0.1 baseline with zero matches; otherwise 0.3 + 0.2 per match,
    /// capped at 1.0. Case-insensitive substring match. The caller
    /// scales this by the per-source weight.
    fn topic_score(&self, text: &str) -> f32 {
        if self.topics.is_empty() {
            return 0.5; // nothing configured, neutral
        }
        let lower = text.to_lowercase();
        let matches = self.topics.iter().filter(|t| lower.contains(t.as_str())).count();
        if matches == 0 {
            0.1
        } else {
            (0.3 + 0.2 * matches as f32).min(1.0)
        }
    }

    /// likes + 2*shares + 3*replies (multipliers configurable),
    /// normalized so `engagement_norm` maps to 1.0.
    fn engagement_score(&self, c: &Candidate) -> f32 {
        let raw = c.likes as f32 * self.scoring.like_weight
            + c.shares as f32 * self.scoring.share_weight
            + c.replies as f32 * self.scoring.reply_weight;
        (raw / self.scoring.engagement_norm).min(1.0)
    }

    /// Sweet spot 1.0; below configured minimum 0.3; above maximum 0.4;
    /// otherwise 0.7; unknown 0.5 (neutral).
    fn author_score(&self, followers: Option<u64>) -> f32 {
        let Some(n) = followers else { return 0.5 };
        if n < self.cadence.target_min_followers {
            0.3
        } else if n > self.cadence.target_max_followers {
            0.4
        } else if (self.cadence.sweet_spot_min..=self.cadence.sweet_spot_max).contains(&n) {
            1.0
        } else {
            0.7
        }
    }

    /// Live-feed candidates get the fixed 0.8 (freshness is structural).
    /// Non-live sources decay linearly over 24h from timestamp age; this
    /// is the documented extension point for batch sources.
    fn recency_score(&self, c: &Candidate) -> f32 {
        if c.from_live_feed {
            return 0.8;
        }
        match c.published_at {
            Some(ts) => {
                let age_secs = (chrono::Utc::now() - ts).num_seconds().max(0) as f32;
                const DAY: f32 = 86_400.0;
                ((DAY - age_secs).max(0.0) / DAY).clamp(0.0, 1.0)
            }
            None => 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    fn scorer_with_topics(s: &Settings) -> CandidateScorer<'_> {
        CandidateScorer::new(&s.scoring, &s.cadence)
    }

    fn settings(topics: &[&str]) -> Settings {
        let mut s = Settings::default();
        s.scoring.boost_topics = topics.iter().map(|t| t.to_string()).collect();
        s
    }

    fn live(id: &str, text: &str) -> Candidate {
        let mut c = Candidate::new(id, "timeline", text);
        c.from_live_feed = true;
        c
    }

    #[test]
    fn golden_baseline_scores_0_255() {
        // Zero topic matches, zero engagement, unknown followers, live
        // feed: 0.1*0.35 + 0*0.30 + 0.5*0.20 + 0.8*0.15 = 0.255.
        let s = settings(&["rust"]);
        let scorer = scorer_with_topics(&s);
        let c = live("x", "nothing relevant here");
        let scored = scorer.score(&c, &|_| false);
        assert!((scored.score - 0.255).abs() < 1e-6, "got {}", scored.score);
    }

    #[test]
    fn topic_matches_raise_the_score() {
        let s = settings(&["rust", "llm"]);
        let scorer = scorer_with_topics(&s);
        let one = scorer.score(&live("a", "rust is neat"), &|_| false);
        let two = scorer.score(&live("b", "rust meets llm"), &|_| false);
        assert!(two.score > one.score);
        assert!((two.breakdown.topic - 0.7).abs() < 1e-6);
    }

    #[test]
    fn engagement_caps_at_norm() {
        let s = settings(&[]);
        let scorer = scorer_with_topics(&s);
        let mut c = live("a", "text");
        c.likes = 500;
        let scored = scorer.score(&c, &|_| false);
        assert_eq!(scored.breakdown.engagement, 1.0);
    }

    #[test]
    fn reply_signal_weighs_heaviest() {
        let s = settings(&[]);
        let scorer = scorer_with_topics(&s);
        let mut replies = live("a", "text");
        replies.replies = 10;
        let mut likes = live("b", "text");
        likes.likes = 10;
        let r = scorer.score(&replies, &|_| false);
        let l = scorer.score(&likes, &|_| false);
        assert!(r.breakdown.engagement > l.breakdown.engagement);
    }

    #[test]
    fn author_fit_bands() {
        let s = settings(&[]);
        let scorer = scorer_with_topics(&s);
        assert_eq!(scorer.author_score(Some(500)), 0.3); // below min
        assert_eq!(scorer.author_score(Some(600_000)), 0.4); // above max
        assert_eq!(scorer.author_score(Some(50_000)), 1.0); // sweet spot
        assert_eq!(scorer.author_score(Some(2_000)), 0.7); // good, not optimal
        assert_eq!(scorer.author_score(None), 0.5); // unknown
    }

    #[test]
    fn repost_scores_zero_despite_everything_else() {
        let s = settings(&["rust"]);
        let scorer = scorer_with_topics(&s);
        let mut c = live("a", "rust rust rust");
        c.likes = 1000;
        c.author_followers = Some(50_000);
        c.is_repost = true;
        let scored = scorer.score(&c, &|_| false);
        assert_eq!(scored.score, 0.0);
    }

    #[test]
    fn muted_topic_excludes_candidate() {
        let mut s = settings(&["rust"]);
        s.scoring.mute_topics = vec!["crypto".into()];
        let scorer = scorer_with_topics(&s);
        let mut c = live("a", "rust meets Crypto trading");
        c.likes = 100;
        assert_eq!(scorer.score(&c, &|_| false).score, 0.0);
    }

    #[test]
    fn source_weight_scales_topic_relevance() {
        let s = settings(&["rust"]);
        let scorer = scorer_with_topics(&s);
        let mut heavy = live("a", "rust release notes");
        heavy.source_weight = 1.5;
        let plain = live("b", "rust release notes");
        let h = scorer.score(&heavy, &|_| false);
        let p = scorer.score(&plain, &|_| false);
        assert!(h.breakdown.topic > p.breakdown.topic);
        assert!(h.breakdown.topic <= 1.0);
    }

    #[test]
    fn handled_candidate_scores_zero() {
        let s = settings(&["rust"]);
        let scorer = scorer_with_topics(&s);
        let c = live("handled-id", "rust everywhere");
        let scored = scorer.score(&c, &|id| id == "handled-id");
        assert_eq!(scored.score, 0.0);
    }

    #[test]
    fn threshold_filters_before_ranking() {
        let mut s = settings(&["rust"]);
        s.scoring.score_threshold = 0.6;
        let scorer = scorer_with_topics(&s);
        // Baseline candidate scores 0.255: below threshold, dropped.
        let ranked = scorer.score_and_rank(&[live("a", "unrelated")], &|_| false);
        assert!(ranked.is_empty());
    }

    #[test]
    fn empty_input_is_empty_output() {
        let s = settings(&["rust"]);
        let scorer = scorer_with_topics(&s);
        assert!(scorer.score_and_rank(&[], &|_| false).is_empty());
    }

    #[test]
    fn ranking_is_descending() {
        let mut s = settings(&["rust"]);
        s.scoring.score_threshold = 0.0;
        let scorer = scorer_with_topics(&s);
        let mut hot = live("hot", "rust and more rust");
        hot.likes = 80;
        let cold = live("cold", "unrelated");
        let ranked = scorer.score_and_rank(&[cold, hot], &|_| false);
        assert_eq!(ranked[0].candidate.id, "hot");
        assert!(ranked[0].score >= ranked[1].score);
    }

    #[test]
    fn select_best_skips_near_duplicates() {
        let mut s = settings(&[]);
        s.scoring.score_threshold = 0.0;
        let scorer = scorer_with_topics(&s);
        let ranked = scorer.score_and_rank(
            &[
                live("a", "New gateway features released today"),
                live("b", "Unrelated news entirely"),
            ],
            &|_| false,
        );
        let best = scorer
            .select_best(ranked, &["New gateway features released today!"])
            .unwrap();
        assert_eq!(best.candidate.id, "b");
    }

    #[test]
    fn select_best_with_no_recent_texts() {
        let mut s = settings(&[]);
        s.scoring.score_threshold = 0.0;
        let scorer = scorer_with_topics(&s);
        let ranked = scorer.score_and_rank(&[live("a", "anything")], &|_| false);
        assert!(scorer.select_best(ranked, &[]).is_some());
    }
}
