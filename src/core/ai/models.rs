use thiserror::Error;

/// Tunables passed through to the model provider on every call.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            model: "deepseek/deepseek-chat-v3.1:free".to_string(),
            temperature: 0.3,
            max_tokens: Some(2048),
        }
    }
}

/// A summarization call that did not produce text.
///
/// Fatal for that summary only; the pipeline reports the channel as
/// "summary unavailable" and moves on. No automatic retry.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model call failed: {0}")]
    Call(String),
    #[error("model returned an empty response")]
    EmptyResponse,
}
