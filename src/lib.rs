// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod config;
pub mod cycle;
pub mod error;
pub mod generation;
pub mod guard;
pub mod ingest;
pub mod metrics;
pub mod publish;
pub mod rotation;
pub mod scheduler;
pub mod scoring;
pub mod state;

// ---- Re-exports for stable public API ----
pub use crate::config::Settings;
pub use crate::cycle::{run_cycle, run_dry, CycleOutcome};
pub use crate::guard::{can_act_now, Decision, DenyReason};
pub use crate::publish::{HttpPublisher, MockPublisher, Outcome, PublishingClient};
pub use crate::rotation::{next_archetype, Archetype};
pub use crate::state::{PublishedRecord, StateStore};
