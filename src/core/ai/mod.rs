pub mod ai_service;
pub mod models;

pub use ai_service::{SummaryProvider, Summarizer};
pub use models::{AiConfig, ModelError};
