// src/config.rs
//! TOML settings with `${ENV}` interpolation and startup validation.
//!
//! A config error is fatal: the process exits with code 2 before any
//! pipeline work starts. Everything has a serde default so a minimal
//! config file (or none at all, for dry runs with mock collaborators)
//! still produces a usable `Settings`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "config/autopilot.toml";
pub const ENV_CONFIG_PATH: &str = "AUTOPILOT_CONFIG_PATH";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProfileConfig {
    #[serde(default)]
    pub name: String,
    /// Optional path to a voice/persona text file embedded in prompts.
    #[serde(default)]
    pub voice_file: Option<PathBuf>,
}

/// One RSS feed to ingest, with a relevance weight applied at scoring time.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub url: String,
    #[serde(default = "default_source_weight")]
    pub weight: f32,
}

fn default_source_weight() -> f32 {
    1.0
}

/// Per-dimension weights for the candidate scorer. The defaults are
/// calibration starting points, not constants.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScoreWeights {
    pub topic: f32,
    pub engagement: f32,
    pub author: f32,
    pub recency: f32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            topic: 0.35,
            engagement: 0.30,
            author: 0.20,
            recency: 0.15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub boost_topics: Vec<String>,
    #[serde(default)]
    pub mute_topics: Vec<String>,
    /// Candidates scoring below this are dropped before ranking.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
    #[serde(default)]
    pub weights: ScoreWeights,
    /// Raw engagement that maps to the 1.0 ceiling.
    #[serde(default = "default_engagement_norm")]
    pub engagement_norm: f32,
    /// Multipliers for the raw engagement sum. Replies weigh highest as
    /// the strongest intent signal; configurable, not assumed correct.
    #[serde(default = "default_like_weight")]
    pub like_weight: f32,
    #[serde(default = "default_share_weight")]
    pub share_weight: f32,
    #[serde(default = "default_reply_weight")]
    pub reply_weight: f32,
    /// Jaro-Winkler similarity above which a candidate is considered a
    /// near-duplicate of recently published content and skipped.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

fn default_score_threshold() -> f32 {
    0.6
}
fn default_engagement_norm() -> f32 {
    100.0
}
fn default_like_weight() -> f32 {
    1.0
}
fn default_share_weight() -> f32 {
    2.0
}
fn default_reply_weight() -> f32 {
    3.0
}
fn default_similarity_threshold() -> f64 {
    0.85
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            boost_topics: Vec::new(),
            mute_topics: Vec::new(),
            score_threshold: default_score_threshold(),
            weights: ScoreWeights::default(),
            engagement_norm: default_engagement_norm(),
            like_weight: default_like_weight(),
            share_weight: default_share_weight(),
            reply_weight: default_reply_weight(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

/// Rate & cadence limits plus the author-fit follower ranges.
#[derive(Debug, Clone, Deserialize)]
pub struct CadenceConfig {
    #[serde(default = "default_max_per_day")]
    pub max_per_day: u32,
    #[serde(default = "default_min_delay_secs")]
    pub min_delay_secs: u64,
    #[serde(default = "default_target_min_followers")]
    pub target_min_followers: u64,
    #[serde(default = "default_target_max_followers")]
    pub target_max_followers: u64,
    #[serde(default = "default_sweet_spot_min")]
    pub sweet_spot_min: u64,
    #[serde(default = "default_sweet_spot_max")]
    pub sweet_spot_max: u64,
}

fn default_max_per_day() -> u32 {
    40
}
fn default_min_delay_secs() -> u64 {
    120
}
fn default_target_min_followers() -> u64 {
    1_000
}
fn default_target_max_followers() -> u64 {
    500_000
}
fn default_sweet_spot_min() -> u64 {
    5_000
}
fn default_sweet_spot_max() -> u64 {
    100_000
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            max_per_day: default_max_per_day(),
            min_delay_secs: default_min_delay_secs(),
            target_min_followers: default_target_min_followers(),
            target_max_followers: default_target_max_followers(),
            sweet_spot_min: default_sweet_spot_min(),
            sweet_spot_max: default_sweet_spot_max(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Target actions per day; daemon pacing derives its tick interval
    /// from this and the active window.
    #[serde(default = "default_actions_per_day")]
    pub actions_per_day: u32,
    /// "HH:MM-HH:MM" in the configured timezone.
    #[serde(default = "default_active_hours")]
    pub active_hours: String,
    /// Fixed UTC offset: "UTC", "+02:00", "-05:30". Day boundaries for
    /// the daily counters use this offset, not UTC midnight.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_actions_per_day() -> u32 {
    10
}
fn default_active_hours() -> String {
    "08:00-22:00".to_string()
}
fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            actions_per_day: default_actions_per_day(),
            active_hours: default_active_hours(),
            timezone: default_timezone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishConfig {
    /// Platform endpoint the HTTP publishing client posts to.
    #[serde(default)]
    pub endpoint: String,
    /// Bearer token; usually `"${PLATFORM_TOKEN}"` in the file.
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default = "default_banned_phrases")]
    pub banned_phrases: Vec<String>,
    #[serde(default = "default_publish_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_length() -> usize {
    280
}
fn default_publish_timeout_secs() -> u64 {
    10
}
fn default_banned_phrases() -> Vec<String> {
    [
        "great post",
        "love this",
        "so true",
        "game changer",
        "couldn't agree more",
        "this is the way",
        "as an ai",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token: String::new(),
            max_length: default_max_length(),
            banned_phrases: default_banned_phrases(),
            timeout_secs: default_publish_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_model")]
    pub model: String,
    /// Keys are `${ENV}`-interpolated; an empty key disables the provider.
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default)]
    pub groq_api_key: String,
    #[serde(default = "default_gen_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_gen_timeout_secs() -> u64 {
    20
}
fn default_max_tokens() -> u32 {
    150
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            openai_api_key: String::new(),
            groq_api_key: String::new(),
            timeout_secs: default_gen_timeout_secs(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub profile: ProfileConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub cadence: CadenceConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("state")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            profile: ProfileConfig::default(),
            sources: Vec::new(),
            scoring: ScoringConfig::default(),
            cadence: CadenceConfig::default(),
            schedule: ScheduleConfig::default(),
            publish: PublishConfig::default(),
            generation: GenerationConfig::default(),
            data_dir: default_data_dir(),
        }
    }
}

impl Settings {
    /// Load from an explicit path, or `$AUTOPILOT_CONFIG_PATH`, or the
    /// default location. A missing file yields defaults; a present but
    /// malformed file is a hard error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => std::env::var(ENV_CONFIG_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH)),
        };

        if !path.exists() {
            let settings = Self::default();
            settings.validate()?;
            return Ok(settings);
        }

        let raw = fs::read_to_string(&path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let mut value: toml::Value =
            toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        interpolate_env(&mut value);
        let settings: Settings = value
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn state_file(&self) -> PathBuf {
        self.data_dir.join("state.json")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.scoring.weights;
        for (name, v) in [
            ("topic", w.topic),
            ("engagement", w.engagement),
            ("author", w.author),
            ("recency", w.recency),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(ConfigError::Validation(format!(
                    "scoring weight `{name}` must be in [0,1], got {v}"
                )));
            }
        }
        // The scorer does not clamp the weighted total; weights summing
        // to 1.0 is what keeps final scores inside [0,1].
        let sum = w.topic + w.engagement + w.author + w.recency;
        if (sum - 1.0).abs() > 1e-3 {
            return Err(ConfigError::Validation(format!(
                "scoring weights must sum to 1.0, got {sum}"
            )));
        }
        if !(0.0..=1.0).contains(&self.scoring.score_threshold) {
            return Err(ConfigError::Validation(format!(
                "score_threshold must be in [0,1], got {}",
                self.scoring.score_threshold
            )));
        }
        if self.cadence.max_per_day == 0 {
            return Err(ConfigError::Validation("max_per_day must be >= 1".into()));
        }
        if self.cadence.sweet_spot_min > self.cadence.sweet_spot_max {
            return Err(ConfigError::Validation(
                "sweet_spot_min must be <= sweet_spot_max".into(),
            ));
        }
        for s in &self.sources {
            if s.weight < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "source {} has negative weight",
                    s.url
                )));
            }
        }
        // Both parse helpers double as validators.
        self.active_hours()?;
        self.timezone_offset()?;
        Ok(())
    }

    /// Parse "HH:MM-HH:MM" into (start_hour, end_hour).
    pub fn active_hours(&self) -> Result<(u32, u32), ConfigError> {
        parse_active_hours(&self.schedule.active_hours)
    }

    pub fn timezone_offset(&self) -> Result<FixedOffset, ConfigError> {
        parse_utc_offset(&self.schedule.timezone)
    }

    pub fn min_delay(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cadence.min_delay_secs as i64)
    }

    /// Voice profile text, or empty when unconfigured/unreadable.
    pub fn voice_profile(&self) -> String {
        match &self.profile.voice_file {
            Some(p) if p.exists() => fs::read_to_string(p).unwrap_or_default(),
            _ => String::new(),
        }
    }
}

/// Replace `"${VAR}"` string values with the environment variable's value
/// (empty string when unset), recursively through tables and arrays.
fn interpolate_env(value: &mut toml::Value) {
    match value {
        toml::Value::String(s) => {
            if let Some(name) = s.strip_prefix("${").and_then(|r| r.strip_suffix('}')) {
                *s = std::env::var(name).unwrap_or_default();
            }
        }
        toml::Value::Table(t) => {
            for (_, v) in t.iter_mut() {
                interpolate_env(v);
            }
        }
        toml::Value::Array(a) => {
            for v in a.iter_mut() {
                interpolate_env(v);
            }
        }
        _ => {}
    }
}

fn parse_active_hours(s: &str) -> Result<(u32, u32), ConfigError> {
    let err = || ConfigError::Validation(format!("active_hours must be HH:MM-HH:MM, got {s:?}"));
    let (start, end) = s.split_once('-').ok_or_else(err)?;
    // End is exclusive, so "00:00-24:00" is the full day.
    let hour = |part: &str, max: u32| -> Result<u32, ConfigError> {
        let h: u32 = part
            .split(':')
            .next()
            .unwrap_or_default()
            .parse()
            .map_err(|_| err())?;
        if h > max {
            return Err(err());
        }
        Ok(h)
    };
    let (start_h, end_h) = (hour(start.trim(), 23)?, hour(end.trim(), 24)?);
    if start_h >= end_h {
        return Err(ConfigError::Validation(format!(
            "active_hours window is empty: {s:?}"
        )));
    }
    Ok((start_h, end_h))
}

/// "UTC" or a fixed offset like "+02:00" / "-05:30".
fn parse_utc_offset(s: &str) -> Result<FixedOffset, ConfigError> {
    if s.eq_ignore_ascii_case("utc") || s == "Z" {
        return Ok(FixedOffset::east_opt(0).unwrap());
    }
    let err = || ConfigError::Validation(format!("timezone must be UTC or +HH:MM, got {s:?}"));
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1i32, &s[1..]),
        Some(b'-') => (-1i32, &s[1..]),
        _ => return Err(err()),
    };
    let (h, m) = rest.split_once(':').ok_or_else(err)?;
    let h: i32 = h.parse().map_err(|_| err())?;
    let m: i32 = m.parse().map_err(|_| err())?;
    if h > 14 || m > 59 {
        return Err(err());
    }
    FixedOffset::east_opt(sign * (h * 3600 + m * 60)).ok_or_else(err)
}
