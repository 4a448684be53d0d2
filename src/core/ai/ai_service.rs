use async_trait::async_trait;

use super::models::{AiConfig, ModelError};

/// A hosted language model reachable over HTTP.
///
/// One blocking call: prompt in, generated text out. Providers map
/// transport and API failures into [`ModelError`].
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    async fn complete(&self, prompt: &str, config: &AiConfig) -> Result<String, ModelError>;
}

// Blanket implementation so the service can hold a trait object when the
// provider is chosen at runtime.
#[async_trait]
impl SummaryProvider for Box<dyn SummaryProvider> {
    async fn complete(&self, prompt: &str, config: &AiConfig) -> Result<String, ModelError> {
        (**self).complete(prompt, config).await
    }
}

/// Thin service over a [`SummaryProvider`]: owns the call config and
/// normalizes the response.
pub struct Summarizer<P: SummaryProvider> {
    provider: P,
    config: AiConfig,
}

impl<P: SummaryProvider> Summarizer<P> {
    pub fn new(provider: P, config: AiConfig) -> Self {
        Self { provider, config }
    }

    /// Runs one summarization call. Whitespace-only responses count as
    /// failures so the report never shows an empty "summary".
    pub async fn summarize(&self, prompt: &str) -> Result<String, ModelError> {
        let text = self.provider.complete(prompt, &self.config).await?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ModelError::EmptyResponse);
        }
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedProvider(String);

    #[async_trait]
    impl SummaryProvider for CannedProvider {
        async fn complete(&self, _prompt: &str, _config: &AiConfig) -> Result<String, ModelError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn summarize_trims_response() {
        let summarizer = Summarizer::new(
            CannedProvider("  the summary \n".to_string()),
            AiConfig::default(),
        );
        let out = summarizer.summarize("prompt").await.unwrap();
        assert_eq!(out, "the summary");
    }

    #[tokio::test]
    async fn blank_response_is_an_error() {
        let summarizer = Summarizer::new(CannedProvider("   \n".to_string()), AiConfig::default());
        let err = summarizer.summarize("prompt").await.unwrap_err();
        assert!(matches!(err, ModelError::EmptyResponse));
    }
}
