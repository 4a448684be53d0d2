pub mod chat_client;
pub mod collector;
pub mod digest_service;
pub mod models;
pub mod prompt;
pub mod report;
pub mod transcript;

pub use chat_client::{ChatClient, FetchError};
pub use digest_service::{DigestError, DigestService};
pub use models::{
    Channel, ChannelKind, ChannelReport, DigestConfig, Guild, GuildDigest, LookbackWindow, Message,
    SummaryStatus, Transcript,
};
pub use prompt::{AnalysisMode, PromptTemplate};
