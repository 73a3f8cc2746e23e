// src/generation/fallback.rs
//! Ordered provider chain. Tries each backend in turn; any error moves
//! on to the next one, and the chain only fails once every backend has.

use async_trait::async_trait;
use tracing::warn;

use crate::error::GenerationError;
use crate::generation::provider::TextGenerator;

pub struct FallbackChain {
    providers: Vec<Box<dyn TextGenerator>>,
}

impl FallbackChain {
    pub fn new(providers: Vec<Box<dyn TextGenerator>>) -> Self {
        Self { providers }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl TextGenerator for FallbackChain {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let mut last = GenerationError::Request {
            provider: "none".into(),
            detail: "no providers configured".into(),
        };
        for provider in &self.providers {
            match provider.generate(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "provider failed, trying next");
                    last = e;
                }
            }
        }
        Err(GenerationError::AllProvidersFailed {
            last: last.to_string(),
        })
    }

    fn name(&self) -> &str {
        "fallback-chain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::provider::MockGenerator;

    #[tokio::test]
    async fn first_success_wins() {
        let chain = FallbackChain::new(vec![
            Box::new(MockGenerator::replying("first")),
            Box::new(MockGenerator::replying("second")),
        ]);
        assert_eq!(chain.generate("p").await.unwrap(), "first");
    }

    #[tokio::test]
    async fn falls_through_rate_limit() {
        let chain = FallbackChain::new(vec![
            Box::new(MockGenerator::failing(|| GenerationError::RateLimited {
                provider: "openai".into(),
            })),
            Box::new(MockGenerator::replying("backup")),
        ]);
        assert_eq!(chain.generate("p").await.unwrap(), "backup");
    }

    #[tokio::test]
    async fn exhausted_chain_reports_last_error() {
        let chain = FallbackChain::new(vec![Box::new(MockGenerator::failing(|| {
            GenerationError::Request {
                provider: "openai".into(),
                detail: "boom".into(),
            }
        }))]);
        let err = chain.generate("p").await.unwrap_err();
        assert!(matches!(err, GenerationError::AllProvidersFailed { .. }));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn empty_chain_fails() {
        let chain = FallbackChain::new(vec![]);
        assert!(chain.is_empty());
        assert!(chain.generate("p").await.is_err());
    }
}
