// The platform seam. Core talks to the messaging platform exclusively
// through this trait; infra provides the serenity-backed implementation
// and an in-memory one for tests.

use async_trait::async_trait;
use thiserror::Error;

use super::models::{Channel, Guild, Message};

/// Errors raised by platform retrieval calls.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Invalid or expired credential. Fatal for the whole run.
    #[error("authentication rejected: {0}")]
    Auth(String),
    /// Unknown guild or channel. Fatal for that unit only.
    #[error("not found: {0}")]
    NotFound(String),
    /// The platform is throttling us.
    #[error("rate limited by platform")]
    RateLimited,
    /// Anything else the platform API returned.
    #[error("platform API error: {0}")]
    Api(String),
}

impl FetchError {
    /// Auth failures poison every remaining call, so the pipeline
    /// aborts instead of skipping.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::Auth(_))
    }
}

/// Retrieval operations against the messaging platform.
///
/// The method set mirrors the tool surface exposed by `serve-tools`:
/// these four calls plus `fetch_guild` are everything the pipeline
/// needs from the platform.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Resolve a guild id to its name.
    async fn fetch_guild(&self, guild_id: u64) -> Result<Guild, FetchError>;

    /// Text channels of a guild, in the platform's enumeration order.
    async fn list_channels(&self, guild_id: u64) -> Result<Vec<Channel>, FetchError>;

    /// Active threads whose parent is the given channel.
    async fn list_threads(&self, channel_id: u64) -> Result<Vec<Channel>, FetchError>;

    /// One page of history, newest first. `before` pages backwards from
    /// the given message id; `None` starts at the channel's newest
    /// message.
    async fn get_messages(
        &self,
        channel_id: u64,
        limit: usize,
        before: Option<u64>,
    ) -> Result<Vec<Message>, FetchError>;

    /// Pinned messages of a channel (curated announcements).
    async fn get_pinned_messages(&self, channel_id: u64) -> Result<Vec<Message>, FetchError>;
}
