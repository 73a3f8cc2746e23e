// src/generation/mod.rs
//! Drafting pipeline: prompt assembly, the provider call, output
//! cleanup and validation, with a single bounded regeneration when the
//! first draft fails validation.

pub mod fallback;
pub mod openai;
pub mod provider;

pub use fallback::FallbackChain;
pub use openai::OpenAiCompatProvider;
pub use provider::{MockGenerator, TextGenerator};

use tracing::{debug, warn};

use crate::config::{GenerationConfig, PublishConfig};
use crate::error::{CycleError, ValidationError};
use crate::ingest::types::Candidate;
use crate::rotation::Archetype;

/// Truncation marker appended when a draft exceeds the length cap.
/// Visible on purpose; invisible truncation would corrupt meaning.
const ELLIPSIS: char = '…';

pub struct Drafter {
    generator: Box<dyn TextGenerator>,
    voice: String,
    max_length: usize,
    banned_phrases: Vec<String>,
}

impl Drafter {
    pub fn new(generator: Box<dyn TextGenerator>, voice: String, publish: &PublishConfig) -> Self {
        Self {
            generator,
            voice,
            max_length: publish.max_length,
            banned_phrases: publish
                .banned_phrases
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
        }
    }

    /// Build the real chain from config: OpenAI first, Groq as fallback.
    /// Unconfigured providers are left out of the chain entirely.
    pub fn from_config(gen: &GenerationConfig, publish: &PublishConfig, voice: String) -> Self {
        let mut providers: Vec<Box<dyn TextGenerator>> = Vec::new();
        let openai = OpenAiCompatProvider::openai(gen);
        if openai.is_configured() {
            providers.push(Box::new(openai));
        }
        let groq = OpenAiCompatProvider::groq(gen);
        if groq.is_configured() {
            providers.push(Box::new(groq));
        }
        Self::new(Box::new(FallbackChain::new(providers)), voice, publish)
    }

    /// Produce a validated draft for the candidate in the given
    /// archetype. Exactly one regeneration is attempted when the first
    /// draft fails validation; a second failure ends the cycle.
    pub async fn draft(
        &self,
        candidate: &Candidate,
        archetype: Archetype,
    ) -> Result<String, CycleError> {
        let prompt = self.build_prompt(candidate, archetype);
        debug!(candidate = %candidate.id, archetype = %archetype, "drafting");

        let raw = self.generator.generate(&prompt).await?;
        let cleaned = self.clean(&raw);
        match self.validate(&cleaned) {
            Ok(()) => Ok(cleaned),
            Err(first) => {
                warn!(error = %first, "draft failed validation, regenerating once");
                let raw = self.generator.generate(&prompt).await?;
                let cleaned = self.clean(&raw);
                self.validate(&cleaned)?;
                Ok(cleaned)
            }
        }
    }

    fn build_prompt(&self, candidate: &Candidate, archetype: Archetype) -> String {
        let mut prompt = String::with_capacity(1024);
        if !self.voice.trim().is_empty() {
            prompt.push_str("Your voice and perspective:\n");
            prompt.push_str(self.voice.trim());
            prompt.push_str("\n\n");
        }
        prompt.push_str("You are writing a short social post reacting to this content:\n\"");
        prompt.push_str(&sanitize_for_prompt(&candidate.text));
        prompt.push_str("\"\n\n");
        if let Some(handle) = &candidate.author_handle {
            prompt.push_str(&format!("Original author: @{handle}\n\n"));
        }
        prompt.push_str(archetype.instructions());
        prompt.push_str("\n\nConstraints:\n");
        prompt.push_str(&format!(
            "- At most {} characters. Shorter is better.\n",
            self.max_length
        ));
        prompt.push_str("- Plain text only. No hashtags, no emojis, no links.\n");
        prompt.push_str("- Output only the post text, nothing else.\n");
        if !self.banned_phrases.is_empty() {
            prompt.push_str("- Never use any of these phrases: ");
            prompt.push_str(&self.banned_phrases.join(", "));
            prompt.push('\n');
        }
        prompt
    }

    /// Strip wrapping quotes and common assistant prefixes, then hard
    /// truncate to the length cap with a visible marker.
    fn clean(&self, raw: &str) -> String {
        let mut text = raw.trim().to_string();

        for quote in ['"', '\u{201c}', '\u{2018}', '\''] {
            let closing = match quote {
                '\u{201c}' => '\u{201d}',
                '\u{2018}' => '\u{2019}',
                q => q,
            };
            if text.starts_with(quote) && text.ends_with(closing) && text.chars().count() > 1 {
                text = text[quote.len_utf8()..text.len() - closing.len_utf8()]
                    .trim()
                    .to_string();
            }
        }

        let lower = text.to_lowercase();
        for prefix in ["reply:", "response:", "answer:", "post:"] {
            if lower.starts_with(prefix) {
                text = text[prefix.len()..].trim_start().to_string();
                break;
            }
        }

        if text.chars().count() > self.max_length {
            let keep = self.max_length.saturating_sub(1);
            let truncated: String = text.chars().take(keep).collect();
            text = format!("{}{}", truncated.trim_end(), ELLIPSIS);
        }
        text
    }

    fn validate(&self, text: &str) -> Result<(), ValidationError> {
        if text.trim().is_empty() {
            return Err(ValidationError::Empty);
        }
        let lower = text.to_lowercase();
        for phrase in &self.banned_phrases {
            if lower.contains(phrase.as_str()) {
                return Err(ValidationError::BannedPhrase(phrase.clone()));
            }
        }
        Ok(())
    }
}

/// Collapse whitespace and cap length before embedding candidate text
/// in a prompt, so one hostile feed entry cannot balloon the request.
fn sanitize_for_prompt(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(600).collect()
}
