// src/ingest/mod.rs
pub mod providers;
pub mod types;

use std::collections::HashSet;

use metrics::counter;
use once_cell::sync::OnceCell;

use crate::ingest::types::{Candidate, ContentSource, TimelineSource};
use crate::metrics::ensure_metrics_described;

/// Normalize candidate text before scoring and prompt embedding:
/// entity-decode, strip tags, fold curly quotes, collapse whitespace,
/// trim trailing sentence punctuation, cap length.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    // 5) Strip trailing sentence punctuation (keep quotes)
    while let Some(last) = out.chars().last() {
        if matches!(last, '!' | '?' | '.' | ',') {
            out.pop();
        } else {
            break;
        }
    }

    // 6) Length cap: 1500 chars
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

/// Normalize text, drop empty candidates, drop already-handled ids,
/// drop in-batch id duplicates. Returns (kept, empty_count, handled_count).
pub fn normalize_and_exclude(
    raw: Vec<Candidate>,
    handled: &dyn Fn(&str) -> bool,
) -> (Vec<Candidate>, usize, usize) {
    let mut empty_out = 0usize;
    let mut handled_out = 0usize;
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut kept = Vec::with_capacity(raw.len());

    for mut c in raw {
        c.text = normalize_text(&c.text);
        if c.text.is_empty() {
            empty_out += 1;
            continue;
        }
        if handled(&c.id) || !seen_ids.insert(c.id.clone()) {
            handled_out += 1;
            continue;
        }
        kept.push(c);
    }

    (kept, empty_out, handled_out)
}

/// Fetch every configured source once and poll every timeline once,
/// skipping failed sources, then normalize and exclude handled
/// candidates. Timeline results are stamped as live-feed candidates.
/// An all-sources failure is a normal empty outcome, not an error.
pub async fn run_once(
    sources: &[Box<dyn ContentSource>],
    timelines: &[Box<dyn TimelineSource>],
    handled: &dyn Fn(&str) -> bool,
) -> Vec<Candidate> {
    ensure_metrics_described();

    let mut raw = Vec::new();
    for s in sources {
        match s.fetch().await {
            Ok(mut v) => {
                counter!("ingest_candidates_total").increment(v.len() as u64);
                raw.append(&mut v);
            }
            Err(e) => {
                tracing::warn!(error = ?e, source = s.name(), "source fetch failed, skipping");
                counter!("ingest_source_errors_total").increment(1);
            }
        }
    }
    for t in timelines {
        match t.poll().await {
            Ok(mut v) => {
                counter!("ingest_candidates_total").increment(v.len() as u64);
                for c in &mut v {
                    c.from_live_feed = true;
                }
                raw.append(&mut v);
            }
            Err(e) => {
                tracing::warn!(error = ?e, source = t.name(), "timeline poll failed, skipping");
                counter!("ingest_source_errors_total").increment(1);
            }
        }
    }

    let (kept, empty_cnt, handled_cnt) = normalize_and_exclude(raw, handled);

    counter!("ingest_kept_total").increment(kept.len() as u64);
    counter!("ingest_excluded_total").increment((empty_cnt + handled_cnt) as u64);
    tracing::debug!(
        kept = kept.len(),
        empty = empty_cnt,
        handled = handled_cnt,
        "ingest pass complete"
    );

    kept
}
