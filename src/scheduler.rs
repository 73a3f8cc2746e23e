// src/scheduler.rs
//! Daemon mode: a paced loop around `cycle::run_cycle`.
//!
//! The tick interval is derived from the active window and the target
//! actions per day, floored at ten minutes. Cycle errors are logged and
//! absorbed; only a corrupt-ledger failure stops the loop. The shutdown
//! future is polled across the whole daemon lifetime, so a Ctrl-C that
//! lands while a cycle is in flight is not dropped: the cycle finishes,
//! the publish-then-record pair stays whole, and the loop exits on the
//! very next pass instead of waiting for another tick.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::cycle::{self, CycleOutcome};
use crate::error::CycleError;
use crate::generation::Drafter;
use crate::ingest::types::{ContentSource, TimelineSource};
use crate::publish::PublishingClient;
use crate::state::StateStore;

/// Pacing floor. Posting more often than this reads as spam regardless
/// of what the config asks for.
const MIN_TICK: Duration = Duration::from_secs(600);

/// Spread the day's action budget evenly across the active window.
pub fn tick_interval(settings: &Settings) -> Duration {
    let (start, end) = match settings.active_hours() {
        Ok(hours) => hours,
        Err(_) => (0, 24), // validated at startup; full day as fallback
    };
    let active_secs = u64::from(end - start) * 3600;
    let per_day = settings.schedule.actions_per_day.max(1) as u64;
    Duration::from_secs(active_secs / per_day).max(MIN_TICK)
}

/// Is `now` inside the configured active window? Start inclusive, end
/// exclusive, evaluated on local hours in the configured offset.
pub fn within_active_hours(settings: &Settings, tz: &FixedOffset, now: DateTime<Utc>) -> bool {
    let (start, end) = match settings.active_hours() {
        Ok(hours) => hours,
        Err(_) => return true,
    };
    let hour = now.with_timezone(tz).hour();
    (start..end).contains(&hour)
}

/// Run the paced loop until Ctrl-C. Returns `Err` only on failures the
/// loop must not survive (ledger persist failures).
pub async fn run_daemon(
    settings: &Settings,
    store: &mut StateStore,
    sources: &[Box<dyn ContentSource>],
    timelines: &[Box<dyn TimelineSource>],
    drafter: &Drafter,
    publisher: &dyn PublishingClient,
) -> anyhow::Result<()> {
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for shutdown signals");
            std::future::pending::<()>().await;
        }
    };
    run_loop(settings, store, sources, timelines, drafter, publisher, shutdown).await
}

/// The loop itself, with the shutdown trigger injected so tests can
/// drive it without process signals. `shutdown` resolving at any point
/// stops the loop after the in-flight cycle, if there is one.
async fn run_loop<F>(
    settings: &Settings,
    store: &mut StateStore,
    sources: &[Box<dyn ContentSource>],
    timelines: &[Box<dyn TimelineSource>],
    drafter: &Drafter,
    publisher: &dyn PublishingClient,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    let tz = settings.timezone_offset()?;
    let tick = tick_interval(settings);
    info!(
        tick_secs = tick.as_secs(),
        active_hours = %settings.schedule.active_hours,
        timezone = %settings.schedule.timezone,
        "daemon started"
    );

    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // Exit wins over a simultaneously ready tick, which is also
            // what makes the shutdown check after a cycle effective: a
            // signal delivered mid-cycle is already Ready here.
            biased;
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping");
                return Ok(());
            }
            _ = interval.tick() => {}
        }

        let now = Utc::now();
        if !within_active_hours(settings, &tz, now) {
            info!("outside active hours, sleeping through tick");
            continue;
        }

        match cycle::run_cycle(settings, store, sources, timelines, drafter, publisher, now).await
        {
            CycleOutcome::Published(record) => {
                info!(published_id = %record.published_id, "cycle published");
            }
            CycleOutcome::Skipped(reason) => {
                info!(%reason, "cycle skipped");
            }
            CycleOutcome::NoEligibleCandidate => {
                info!("cycle found no eligible candidate");
            }
            CycleOutcome::Failed(CycleError::State(e)) => {
                // The ledger can no longer be trusted; stop rather than
                // risk duplicate posts on the next tick.
                error!(error = %e, "ledger failure, daemon stopping");
                return Err(e.into());
            }
            CycleOutcome::Failed(e) => {
                warn!(error = %e, "cycle failed, continuing to next tick");
            }
            CycleOutcome::DryRun { .. } => unreachable!("daemon never runs dry cycles"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PublishConfig;
    use crate::generation::MockGenerator;
    use crate::ingest::types::Candidate;
    use crate::publish::MockPublisher;
    use chrono::TimeZone;

    #[test]
    fn interval_spreads_budget_across_window() {
        let mut s = Settings::default();
        s.schedule.active_hours = "08:00-22:00".into(); // 14h window
        s.schedule.actions_per_day = 14;
        assert_eq!(tick_interval(&s), Duration::from_secs(3600));
    }

    #[test]
    fn interval_never_drops_below_floor() {
        let mut s = Settings::default();
        s.schedule.active_hours = "08:00-10:00".into();
        s.schedule.actions_per_day = 100;
        assert_eq!(tick_interval(&s), MIN_TICK);
    }

    #[test]
    fn active_hours_respect_configured_offset() {
        let mut s = Settings::default();
        s.schedule.active_hours = "08:00-22:00".into();
        s.schedule.timezone = "+02:00".into();
        let tz = s.timezone_offset().unwrap();

        // 06:30 UTC is 08:30 local: inside.
        let inside = Utc.with_ymd_and_hms(2025, 6, 1, 6, 30, 0).unwrap();
        assert!(within_active_hours(&s, &tz, inside));

        // 21:00 UTC is 23:00 local: outside.
        let outside = Utc.with_ymd_and_hms(2025, 6, 1, 21, 0, 0).unwrap();
        assert!(!within_active_hours(&s, &tz, outside));
    }

    #[test]
    fn window_end_is_exclusive() {
        let mut s = Settings::default();
        s.schedule.active_hours = "08:00-22:00".into();
        let tz = s.timezone_offset().unwrap();
        let at_end = Utc.with_ymd_and_hms(2025, 6, 1, 22, 0, 0).unwrap();
        assert!(!within_active_hours(&s, &tz, at_end));
        let at_start = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        assert!(within_active_hours(&s, &tz, at_start));
    }

    fn daemon_settings() -> Settings {
        let mut s = Settings::default();
        s.schedule.active_hours = "00:00-24:00".into();
        s.scoring.boost_topics = vec!["rust".into()];
        s.cadence.min_delay_secs = 0;
        s
    }

    fn daemon_drafter() -> Drafter {
        Drafter::new(
            Box::new(MockGenerator::replying("A measured answer.")),
            String::new(),
            &PublishConfig::default(),
        )
    }

    #[tokio::test]
    async fn already_resolved_shutdown_stops_before_any_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = StateStore::load(dir.path().join("state.json")).unwrap();
        let publisher = MockPublisher::accepting();
        let sources: Vec<Box<dyn ContentSource>> = Vec::new();

        let res = run_loop(
            &daemon_settings(),
            &mut store,
            &sources,
            &[],
            &daemon_drafter(),
            &publisher,
            std::future::ready(()),
        )
        .await;
        assert!(res.is_ok());
        assert!(publisher.published.lock().unwrap().is_empty());
    }

    /// Source whose fetch fires the shutdown trigger, so the signal
    /// lands while the cycle is still running.
    struct SignalingSource {
        fire: std::sync::Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
    }

    #[async_trait::async_trait]
    impl ContentSource for SignalingSource {
        async fn fetch(&self) -> anyhow::Result<Vec<Candidate>> {
            if let Some(tx) = self.fire.lock().unwrap().take() {
                let _ = tx.send(());
            }
            let mut c = Candidate::new("c1", "feed", "Profiling rust allocators under load");
            c.from_live_feed = true;
            c.likes = 90;
            c.author_followers = Some(10_000);
            Ok(vec![c])
        }
        fn name(&self) -> &str {
            "signaling"
        }
    }

    #[tokio::test]
    async fn mid_cycle_shutdown_finishes_the_cycle_then_stops() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = StateStore::load(dir.path().join("state.json")).unwrap();
        let publisher = MockPublisher::accepting();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let sources: Vec<Box<dyn ContentSource>> = vec![Box::new(SignalingSource {
            fire: std::sync::Mutex::new(Some(tx)),
        })];

        // Without the mid-cycle signal taking effect the loop would sit
        // on the next tick for MIN_TICK and the timeout would fire.
        let res = tokio::time::timeout(
            Duration::from_secs(5),
            run_loop(
                &daemon_settings(),
                &mut store,
                &sources,
                &[],
                &daemon_drafter(),
                &publisher,
                async move {
                    let _ = rx.await;
                },
            ),
        )
        .await
        .expect("daemon did not stop after the in-flight cycle");
        assert!(res.is_ok());

        // The signal never tore the cycle: the post went out and was
        // recorded before the loop exited.
        assert_eq!(publisher.published.lock().unwrap().len(), 1);
        assert!(store.is_handled("c1"));
    }
}
