// src/ingest/providers/rss.rs
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::ingest::normalize_text;
use crate::ingest::types::{Candidate, ContentSource};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// RSS feed source. The feed URL doubles as the origin tag; item links
/// become candidate ids (which is what deduplication keys on).
pub struct RssSource {
    name: String,
    weight: f32,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RssSource {
    pub fn from_url(url: &str, weight: f32) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("social-autopilot/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            name: feed_name(url),
            weight,
            mode: Mode::Http {
                url: url.to_string(),
                client,
            },
        }
    }

    /// Parse canned XML instead of fetching; used by tests.
    pub fn from_fixture(name: &str, xml: &str, weight: f32) -> Self {
        Self {
            name: name.to_string(),
            weight,
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    fn parse_items(&self, xml: &str) -> Result<Vec<Candidate>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(xml);
        let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let text_raw = format!(
                "{}. {}",
                it.title.as_deref().unwrap_or_default(),
                it.description.as_deref().unwrap_or_default()
            );
            let text = normalize_text(&text_raw);
            if text.is_empty() {
                continue;
            }
            // Items without a link have no stable identity; skip them.
            let Some(link) = it.link.filter(|l| !l.trim().is_empty()) else {
                continue;
            };

            let mut c = Candidate::new(link, self.name.clone(), text);
            c.published_at = it.pub_date.as_deref().and_then(parse_rfc2822);
            c.source_weight = self.weight;
            out.push(c);
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("ingest_events_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl ContentSource for RssSource {
    async fn fetch(&self) -> Result<Vec<Candidate>> {
        match &self.mode {
            Mode::Fixture(xml) => self.parse_items(xml),
            Mode::Http { url, client } => {
                let body = client
                    .get(url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .with_context(|| format!("rss http get {url}"))?
                    .text()
                    .await
                    .context("rss http .text()")?;
                self.parse_items(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Derive a short origin tag from the feed URL (host, sans "www.").
fn feed_name(url: &str) -> String {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("www.")
        .split('/')
        .next()
        .unwrap_or(url)
        .to_string()
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Example Feed</title>
    <item>
      <title>Rust 1.90 released</title>
      <link>https://example.com/rust-1-90</link>
      <pubDate>Sat, 16 Aug 2025 10:00:00 GMT</pubDate>
      <description>The release adds &ldquo;things&rdquo;.</description>
    </item>
    <item>
      <title></title>
      <description></description>
    </item>
  </channel>
</rss>"#;

    #[tokio::test]
    async fn parses_fixture_items() {
        let src = RssSource::from_fixture("example", FIXTURE, 1.5);
        let items = src.fetch().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "https://example.com/rust-1-90");
        assert_eq!(items[0].origin, "example");
        assert!(items[0].text.starts_with("Rust 1.90 released"));
        assert!(items[0].published_at.is_some());
        assert_eq!(items[0].source_weight, 1.5);
    }

    #[test]
    fn feed_name_strips_scheme_and_path() {
        assert_eq!(feed_name("https://www.example.com/feed.xml"), "example.com");
        assert_eq!(feed_name("http://blog.dev/rss"), "blog.dev");
    }
}
