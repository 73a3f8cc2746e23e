// src/error.rs
//! Typed error taxonomy for the posting engine.
//!
//! Only `Config` and `State` errors are fatal to the process; everything
//! else is recoverable at the cycle level (see the scheduler, which logs
//! and proceeds to the next trigger).

use thiserror::Error;

/// Configuration problems. Fatal at startup; never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in config: {0}")]
    Parse(String),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Durable-state problems. `Corrupt` is fatal: silently treating an
/// unreadable state file as empty would risk duplicate actions.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("corrupt state file {path}: {detail}")]
    Corrupt { path: String, detail: String },

    #[error("failed to persist state: {0}")]
    Persist(#[from] std::io::Error),
}

/// A content source failed to fetch or parse. Recoverable: the cycle
/// skips the source and continues with the rest.
#[derive(Debug, Error)]
#[error("source {source_name} unavailable: {detail}")]
pub struct SourceError {
    pub source_name: String,
    pub detail: String,
}

/// Text generation failed.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("provider {provider} request failed: {detail}")]
    Request { provider: String, detail: String },

    #[error("provider {provider} rate-limited")]
    RateLimited { provider: String },

    #[error("all configured providers failed (last: {last})")]
    AllProvidersFailed { last: String },
}

impl GenerationError {
    /// Rate limits are what the fallback chain advances on.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Generated text failed post-processing checks.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("generated text is empty after cleanup")]
    Empty,

    #[error("generated text contains banned phrase {0:?}")]
    BannedPhrase(String),
}

/// The publishing platform rejected or failed the call. `RateLimited` is
/// distinguished for operator diagnostics; handling is identical (no
/// state mutation, candidate stays eligible).
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("platform rate limit hit")]
    RateLimited,

    #[error("authentication rejected by platform")]
    Auth,

    #[error("publish request timed out")]
    Timeout,

    #[error("publish failed: {0}")]
    Http(String),
}

/// Anything that can end a cycle early. Used by the orchestrator's
/// `Outcome::Failed` and mapped to exit codes in main.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("generation: {0}")]
    Generation(#[from] GenerationError),

    #[error("validation: {0}")]
    Validation(#[from] ValidationError),

    #[error("publish: {0}")]
    Publish(#[from] PublishError),

    #[error("state: {0}")]
    State(#[from] StateError),
}
