// src/cycle.rs
//! One end-to-end cycle: ingest, score, select, rotate, draft, publish.
//! The scheduler and the CLI both drive the pipeline through this
//! module; neither knows the pipeline internals.

use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::{debug, info};

use crate::config::Settings;
use crate::generation::Drafter;
use crate::guard::DenyReason;
use crate::ingest;
use crate::ingest::providers::rss::RssSource;
use crate::ingest::types::{Candidate, ContentSource, TimelineSource};
use crate::publish::{attempt_publish, Outcome, PublishingClient};
use crate::rotation::{default_window, next_archetype, Archetype};
use crate::scoring::CandidateScorer;
use crate::state::{PublishedRecord, StateStore};

/// How many recent published texts the near-duplicate check compares
/// against.
const RECENT_TEXTS_WINDOW: usize = 25;

/// The result of one cycle, in decreasing order of interest. Only
/// `Failed` maps to a non-zero process exit; the rest are normal.
#[derive(Debug)]
pub enum CycleOutcome {
    Published(PublishedRecord),
    /// Would-publish result of a dry run: nothing sent, nothing stored.
    DryRun {
        candidate_id: String,
        archetype: Archetype,
        text: String,
    },
    Skipped(DenyReason),
    /// Nothing survived scoring and dedup. Normal on quiet feeds.
    NoEligibleCandidate,
    Failed(crate::error::CycleError),
}

/// Build the configured feed sources.
pub fn build_sources(settings: &Settings) -> Vec<Box<dyn ContentSource>> {
    settings
        .sources
        .iter()
        .map(|s| Box::new(RssSource::from_url(&s.url, s.weight)) as Box<dyn ContentSource>)
        .collect()
}

/// Ingest + score + select. Shared by the live and dry paths.
async fn pick_candidate(
    settings: &Settings,
    store: &StateStore,
    sources: &[Box<dyn ContentSource>],
    timelines: &[Box<dyn TimelineSource>],
) -> Option<(Candidate, Archetype)> {
    let handled = |id: &str| store.is_handled(id);
    let candidates = ingest::run_once(sources, timelines, &handled).await;
    if candidates.is_empty() {
        debug!("no candidates survived ingest");
        return None;
    }

    let scorer = CandidateScorer::new(&settings.scoring, &settings.cadence);
    let ranked = scorer.score_and_rank(&candidates, &handled);
    debug!(
        ingested = candidates.len(),
        above_threshold = ranked.len(),
        "scoring complete"
    );

    let recent = store.recent_texts(RECENT_TEXTS_WINDOW);
    let best = scorer.select_best(ranked, &recent)?;
    let archetype = next_archetype(store.rotation_history(), default_window());
    info!(
        candidate = %best.candidate.id,
        score = best.score,
        %archetype,
        "selected candidate"
    );
    Some((best.candidate, archetype))
}

/// Run one live cycle against the real (or injected) collaborators.
pub async fn run_cycle(
    settings: &Settings,
    store: &mut StateStore,
    sources: &[Box<dyn ContentSource>],
    timelines: &[Box<dyn TimelineSource>],
    drafter: &Drafter,
    publisher: &dyn PublishingClient,
    now: DateTime<Utc>,
) -> CycleOutcome {
    counter!("cycle_runs_total").increment(1);

    let tz = match settings.timezone_offset() {
        Ok(tz) => tz,
        // Unreachable after Settings::validate, but never panic here.
        Err(e) => {
            return CycleOutcome::Failed(crate::error::CycleError::State(
                crate::error::StateError::Corrupt {
                    path: "config".into(),
                    detail: e.to_string(),
                },
            ))
        }
    };

    // Cheap guard pass before any network spend; attempt_publish
    // re-checks right before acting.
    if let crate::guard::Decision::Denied(reason) =
        crate::guard::can_act_now(store, settings, &tz, now)
    {
        info!(%reason, "cycle skipped before ingest");
        return CycleOutcome::Skipped(reason);
    }

    let Some((candidate, archetype)) = pick_candidate(settings, store, sources, timelines).await
    else {
        return CycleOutcome::NoEligibleCandidate;
    };

    match attempt_publish(
        store, settings, &tz, drafter, publisher, &candidate, archetype, now,
    )
    .await
    {
        Outcome::Published(record) => CycleOutcome::Published(record),
        Outcome::Skipped(reason) => CycleOutcome::Skipped(reason),
        Outcome::Failed(e) => CycleOutcome::Failed(e),
    }
}

/// Dry run: full pipeline through drafting, then stop. No publish call,
/// no state mutation of any kind.
pub async fn run_dry(
    settings: &Settings,
    store: &StateStore,
    sources: &[Box<dyn ContentSource>],
    timelines: &[Box<dyn TimelineSource>],
    drafter: &Drafter,
) -> CycleOutcome {
    let Some((candidate, archetype)) = pick_candidate(settings, store, sources, timelines).await
    else {
        return CycleOutcome::NoEligibleCandidate;
    };

    match drafter.draft(&candidate, archetype).await {
        Ok(text) => {
            info!(candidate = %candidate.id, %archetype, "dry run draft ready");
            CycleOutcome::DryRun {
                candidate_id: candidate.id,
                archetype,
                text,
            }
        }
        Err(e) => CycleOutcome::Failed(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PublishConfig;
    use crate::generation::MockGenerator;
    use crate::publish::MockPublisher;
    use anyhow::Result;
    use async_trait::async_trait;

    struct FixedSource(Vec<Candidate>);

    #[async_trait]
    impl ContentSource for FixedSource {
        async fn fetch(&self) -> Result<Vec<Candidate>> {
            Ok(self.0.clone())
        }
        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn hot_candidate(id: &str) -> Candidate {
        let mut c = Candidate::new(id, "fixed", "Benchmarking rust async runtimes in production");
        c.from_live_feed = true;
        c.likes = 90;
        c.author_followers = Some(10_000);
        c
    }

    fn settings() -> Settings {
        let mut s = Settings::default();
        s.scoring.boost_topics = vec!["rust".into()];
        s
    }

    fn drafter() -> Drafter {
        Drafter::new(
            Box::new(MockGenerator::replying("A thoughtful reply.")),
            String::new(),
            &PublishConfig::default(),
        )
    }

    fn fresh_store(dir: &tempfile::TempDir) -> StateStore {
        StateStore::load(dir.path().join("state.json")).unwrap()
    }

    #[tokio::test]
    async fn full_cycle_publishes_best_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = fresh_store(&dir);
        let sources: Vec<Box<dyn ContentSource>> =
            vec![Box::new(FixedSource(vec![hot_candidate("c1")]))];
        let publisher = MockPublisher::accepting();

        let out = run_cycle(
            &settings(),
            &mut store,
            &sources,
            &[],
            &drafter(),
            &publisher,
            Utc::now(),
        )
        .await;
        let CycleOutcome::Published(record) = out else {
            panic!("expected Published, got {out:?}");
        };
        assert_eq!(record.candidate_id, "c1");
        assert!(store.is_handled("c1"));
    }

    struct FixedTimeline(Vec<Candidate>);

    #[async_trait]
    impl TimelineSource for FixedTimeline {
        async fn poll(&self) -> Result<Vec<Candidate>> {
            Ok(self.0.clone())
        }
        fn name(&self) -> &str {
            "fixed-timeline"
        }
    }

    #[tokio::test]
    async fn timeline_candidate_is_published_as_reply() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = fresh_store(&dir);
        // The timeline hands out the raw post; ingest stamps it live.
        let mut post = Candidate::new("post-77", "timeline", "Hot take about rust futures");
        post.likes = 90;
        post.author_followers = Some(10_000);
        let timelines: Vec<Box<dyn TimelineSource>> = vec![Box::new(FixedTimeline(vec![post]))];
        let publisher = MockPublisher::accepting();

        let out = run_cycle(
            &settings(),
            &mut store,
            &[],
            &timelines,
            &drafter(),
            &publisher,
            Utc::now(),
        )
        .await;
        let CycleOutcome::Published(record) = out else {
            panic!("expected Published, got {out:?}");
        };
        assert_eq!(record.candidate_id, "post-77");
        assert_eq!(
            publisher.reply_targets.lock().unwrap().as_slice(),
            &[Some("post-77".to_string())]
        );
    }

    #[tokio::test]
    async fn quiet_feed_is_no_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = fresh_store(&dir);
        let sources: Vec<Box<dyn ContentSource>> = vec![Box::new(FixedSource(vec![]))];
        let publisher = MockPublisher::accepting();

        let out = run_cycle(
            &settings(),
            &mut store,
            &sources,
            &[],
            &drafter(),
            &publisher,
            Utc::now(),
        )
        .await;
        assert!(matches!(out, CycleOutcome::NoEligibleCandidate));
    }

    #[tokio::test]
    async fn below_threshold_candidates_are_not_published() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = fresh_store(&dir);
        // No topic match, no engagement: scores 0.255, below 0.6.
        let mut dull = Candidate::new("dull", "fixed", "nothing interesting");
        dull.from_live_feed = true;
        let sources: Vec<Box<dyn ContentSource>> = vec![Box::new(FixedSource(vec![dull]))];
        let publisher = MockPublisher::accepting();

        let out = run_cycle(
            &settings(),
            &mut store,
            &sources,
            &[],
            &drafter(),
            &publisher,
            Utc::now(),
        )
        .await;
        assert!(matches!(out, CycleOutcome::NoEligibleCandidate));
        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dry_run_mutates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = fresh_store(&dir);
        let sources: Vec<Box<dyn ContentSource>> =
            vec![Box::new(FixedSource(vec![hot_candidate("c1")]))];

        let out = run_dry(&settings(), &store, &sources, &[], &drafter()).await;
        let CycleOutcome::DryRun {
            candidate_id, text, ..
        } = out
        else {
            panic!("expected DryRun, got {out:?}");
        };
        assert_eq!(candidate_id, "c1");
        assert_eq!(text, "A thoughtful reply.");
        assert!(!store.is_handled("c1"));
        assert!(store.state().records.is_empty());
        assert!(!dir.path().join("state.json").exists());
    }

    #[tokio::test]
    async fn second_cycle_skips_handled_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = fresh_store(&dir);
        let sources: Vec<Box<dyn ContentSource>> =
            vec![Box::new(FixedSource(vec![hot_candidate("c1")]))];
        let publisher = MockPublisher::accepting();
        let mut settings = settings();
        settings.cadence.min_delay_secs = 0;

        let now = Utc::now();
        let first = run_cycle(
            &settings,
            &mut store,
            &sources,
            &[],
            &drafter(),
            &publisher,
            now,
        )
        .await;
        assert!(matches!(first, CycleOutcome::Published(_)));

        let second = run_cycle(
            &settings,
            &mut store,
            &sources,
            &[],
            &drafter(),
            &publisher,
            now + chrono::Duration::minutes(10),
        )
        .await;
        assert!(matches!(second, CycleOutcome::NoEligibleCandidate));
        assert_eq!(publisher.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn archetypes_rotate_across_cycles() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = fresh_store(&dir);
        let publisher = MockPublisher::accepting();
        let mut settings = settings();
        settings.cadence.min_delay_secs = 0;

        let mut seen = Vec::new();
        let now = Utc::now();
        for i in 0..3i64 {
            let sources: Vec<Box<dyn ContentSource>> = vec![Box::new(FixedSource(vec![
                hot_candidate(&format!("c{i}")),
            ]))];
            let out = run_cycle(
                &settings,
                &mut store,
                &sources,
                &[],
                &drafter(),
                &publisher,
                now + chrono::Duration::minutes(10 * i),
            )
            .await;
            let CycleOutcome::Published(record) = out else {
                panic!("cycle {i} did not publish: {out:?}");
            };
            seen.push(record.archetype);
        }
        assert_ne!(seen[0], seen[1]);
        assert_ne!(seen[1], seen[2]);
        assert_ne!(seen[0], seen[2]);
    }
}
