// src/rotation.rs
//! Archetype rotation biased toward variety.
//!
//! Selection rule: among archetypes not present in the most recent K
//! history entries (K defaults to set size - 1), pick the least recently
//! used; archetypes never used at all win first, in declaration order.
//! Fully deterministic so the fairness property is testable: with K < S,
//! no archetype repeats within any K consecutive selections.

use serde::{Deserialize, Serialize};

/// Content patterns used to shape generation. Declaration order is the
/// fixed tie-break priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Archetype {
    Expert,
    Contrarian,
    Question,
    Story,
    Simplifier,
}

pub const ARCHETYPES: [Archetype; 5] = [
    Archetype::Expert,
    Archetype::Contrarian,
    Archetype::Question,
    Archetype::Story,
    Archetype::Simplifier,
];

impl Archetype {
    pub fn name(self) -> &'static str {
        match self {
            Archetype::Expert => "expert",
            Archetype::Contrarian => "contrarian",
            Archetype::Question => "question",
            Archetype::Story => "story",
            Archetype::Simplifier => "simplifier",
        }
    }

    /// Archetype-specific instruction block embedded in the prompt.
    pub fn instructions(self) -> &'static str {
        match self {
            Archetype::Expert => {
                "Add ONE specific insight from your experience that extends their point.\n\
                 Pattern: [Agreement/validation] + [Your specific addition]\n\
                 Must include concrete detail (numbers, specific tech, real example)."
            }
            Archetype::Contrarian => {
                "Respectfully push back on ONE aspect while acknowledging the core point.\n\
                 Pattern: [Acknowledge merit] + but [your counterpoint] + [brief why]\n\
                 Not argumentative. Thoughtful disagreement that sparks discussion."
            }
            Archetype::Question => {
                "Ask ONE specific question that shows you understood AND thought deeper.\n\
                 Pattern: [Brief context] + [Specific question]?\n\
                 The question should make THEM think, not be easily answered."
            }
            Archetype::Story => {
                "Share a 1-2 sentence personal experience that relates.\n\
                 Pattern: [What happened] + [What you learned]\n\
                 Must be specific (not \"I once had this problem too\")."
            }
            Archetype::Simplifier => {
                "Reframe their point more memorably in fewer words.\n\
                 Pattern: \"TL;DR: [their point distilled]\" or [Metaphor that captures it]\n\
                 Add a fresh angle they might not have considered."
            }
        }
    }
}

impl std::fmt::Display for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Pick the next archetype given the rotation history (oldest first).
/// `window` is K; values >= set size are clamped to size - 1 so there is
/// always at least one eligible archetype.
pub fn next_archetype(history: &[Archetype], window: usize) -> Archetype {
    let window = window.min(ARCHETYPES.len() - 1);
    let recent: &[Archetype] = if history.len() > window {
        &history[history.len() - window..]
    } else {
        history
    };

    let mut best: Option<(Option<usize>, Archetype)> = None;
    for &a in &ARCHETYPES {
        if recent.contains(&a) {
            continue;
        }
        // Last position of `a` anywhere in history; None means never used.
        let last_used = history.iter().rposition(|&h| h == a);
        let candidate = (last_used, a);
        best = match best {
            None => Some(candidate),
            // Never-used (None) sorts before any Some; among Some, the
            // smaller (older) position wins. Declaration order already
            // breaks exact ties because we iterate ARCHETYPES in order.
            Some(cur) if candidate.0 < cur.0 => Some(candidate),
            Some(cur) => Some(cur),
        };
    }

    // `window <= len - 1` guarantees at least one archetype is eligible.
    best.map(|(_, a)| a).unwrap_or(ARCHETYPES[0])
}

/// Default K: set size - 1 (strictly no repeat until every other
/// archetype has had a turn).
pub fn default_window() -> usize {
    ARCHETYPES.len() - 1
}
