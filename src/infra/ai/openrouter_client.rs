use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::core::ai::{AiConfig, ModelError, SummaryProvider};

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

pub struct OpenRouterClient {
    client: Client,
    api_key: String,
}

impl OpenRouterClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl SummaryProvider for OpenRouterClient {
    async fn complete(&self, prompt: &str, config: &AiConfig) -> Result<String, ModelError> {
        let payload = json!({
            "model": config.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": config.temperature,
            "max_tokens": config.max_tokens,
        });

        let response = self
            .client
            .post(OPENROUTER_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ModelError::Call(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            tracing::error!(%status, body = %text, "OpenRouter API error");
            return Err(ModelError::Call(format!("{status}: {text}")));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ModelError::Call(e.to_string()))?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(ModelError::EmptyResponse)?
            .to_string();

        Ok(content)
    }
}
