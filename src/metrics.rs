// src/metrics.rs
//! One-time metric registration so series carry descriptions when a
//! recorder is installed. Without a recorder the macros are no-ops.

use metrics::{describe_counter, describe_histogram};
use once_cell::sync::OnceCell;

pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_events_total", "Items parsed from sources.");
        describe_counter!(
            "ingest_candidates_total",
            "Candidates fetched before exclusion."
        );
        describe_counter!(
            "ingest_kept_total",
            "Candidates kept after normalization + handled-set exclusion."
        );
        describe_counter!(
            "ingest_excluded_total",
            "Candidates dropped (empty text or already handled)."
        );
        describe_counter!("ingest_source_errors_total", "Source fetch/parse errors.");
        describe_histogram!("ingest_parse_ms", "Source parse time in milliseconds.");
        describe_counter!("cycle_runs_total", "Cycles executed.");
        describe_counter!("publish_published_total", "Successful publishes.");
        describe_counter!("publish_skipped_total", "Cycles skipped by the cadence guard.");
        describe_counter!("publish_failed_total", "Cycles failed at generate/publish.");
    });
}
