// src/generation/provider.rs
//! Provider abstraction for the text collaborator. Concrete backends
//! (OpenAI-compatible HTTP, mocks) implement `TextGenerator`; the
//! orchestrator and fallback chain only see the trait.

use async_trait::async_trait;

use crate::error::GenerationError;

/// A single text-generation backend. One prompt in, raw text out.
/// Cleanup and validation happen above this layer.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Provider name for logs and error context.
    fn name(&self) -> &str;
}

/// Deterministic backend for tests and dry runs without credentials.
/// Returns the canned response, or the canned error if configured.
pub struct MockGenerator {
    response: Result<String, fn() -> GenerationError>,
}

impl MockGenerator {
    pub fn replying(text: &str) -> Self {
        Self {
            response: Ok(text.to_string()),
        }
    }

    pub fn failing(make: fn() -> GenerationError) -> Self {
        Self {
            response: Err(make),
        }
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        match &self.response {
            Ok(text) => Ok(text.clone()),
            Err(make) => Err(make()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
