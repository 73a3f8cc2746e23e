// src/guard.rs
//! Rate & cadence guard: "is it safe/allowed to act now?"
//!
//! Pure decision function over the state store and configuration; no
//! side effects. Both checks are evaluated and the daily-limit reason
//! wins when both would deny (deterministic, documented ordering).

use chrono::{DateTime, FixedOffset, Utc};

use crate::config::Settings;
use crate::state::StateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied(DenyReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    DailyLimitReached,
    MinDelayNotElapsed,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::DailyLimitReached => f.write_str("daily limit reached"),
            DenyReason::MinDelayNotElapsed => f.write_str("minimum delay not elapsed"),
        }
    }
}

/// Check the daily cap (calendar day in `tz`) and the minimum delay
/// since the last action (no action ever counts as elapsed).
pub fn can_act_now(
    store: &StateStore,
    settings: &Settings,
    tz: &FixedOffset,
    now: DateTime<Utc>,
) -> Decision {
    let today = now.with_timezone(tz).date_naive();
    let daily_hit = store.count_actions_on(today) >= settings.cadence.max_per_day;

    let delay_hit = match store.time_since_last_action(now) {
        Some(elapsed) => elapsed < settings.min_delay(),
        None => false,
    };

    if daily_hit {
        Decision::Denied(DenyReason::DailyLimitReached)
    } else if delay_hit {
        Decision::Denied(DenyReason::MinDelayNotElapsed)
    } else {
        Decision::Allowed
    }
}
