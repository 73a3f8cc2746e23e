// src/generation/openai.rs
//! OpenAI-compatible chat-completions backend. The same struct serves
//! OpenAI and Groq; only the base URL, key and display name differ.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GenerationConfig;
use crate::error::GenerationError;
use crate::generation::provider::TextGenerator;

const OPENAI_BASE: &str = "https://api.openai.com/v1";
const GROQ_BASE: &str = "https://api.groq.com/openai/v1";

pub struct OpenAiCompatProvider {
    http: reqwest::Client,
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiCompatProvider {
    pub fn openai(cfg: &GenerationConfig) -> Self {
        Self::new("openai", OPENAI_BASE, &cfg.openai_api_key, cfg)
    }

    pub fn groq(cfg: &GenerationConfig) -> Self {
        Self::new("groq", GROQ_BASE, &cfg.groq_api_key, cfg)
    }

    fn new(name: &str, base_url: &str, api_key: &str, cfg: &GenerationConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("social-autopilot/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            http,
            name: name.to_string(),
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn request_err(&self, detail: impl Into<String>) -> GenerationError {
        GenerationError::Request {
            provider: self.name.clone(),
            detail: detail.into(),
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatProvider {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        if self.api_key.is_empty() {
            return Err(self.request_err("no api key configured"));
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let req = Req {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: prompt,
            }],
            temperature: 0.8,
            max_tokens: self.max_tokens,
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| self.request_err(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GenerationError::RateLimited {
                provider: self.name.clone(),
            });
        }
        if !status.is_success() {
            return Err(self.request_err(format!("http {status}")));
        }

        let body: Resp = resp
            .json()
            .await
            .map_err(|e| self.request_err(format!("bad response body: {e}")))?;
        let content = body
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();
        debug!(provider = %self.name, chars = content.len(), "completion received");
        Ok(content)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
