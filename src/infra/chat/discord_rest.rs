// Discord REST implementation of the ChatClient trait. It deliberately
// exposes only the calls the core layer needs, over serenity's plain
// HTTP client - no gateway connection, no cache.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serenity::http::{Http, HttpError, MessagePagination};
use serenity::model::channel::Channel as SerenityChannel;
use serenity::model::channel::{ChannelType, GuildChannel};
use serenity::model::id::{ChannelId, GuildId, MessageId};

use crate::core::digest::{Channel, ChannelKind, ChatClient, FetchError, Guild, Message};

/// How often a rate-limited call is retried before the channel is
/// given up on.
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

pub struct DiscordRestClient {
    http: Http,
}

impl DiscordRestClient {
    pub fn new(token: &str) -> Self {
        Self {
            http: Http::new(token),
        }
    }

    /// Retries rate-limited calls with exponential backoff. Every other
    /// error returns immediately.
    async fn retry<T, F, Fut>(&self, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut delay = INITIAL_BACKOFF;
        let mut attempt = 0;
        loop {
            match op().await {
                Err(FetchError::RateLimited) if attempt < MAX_RETRIES => {
                    attempt += 1;
                    tracing::warn!(attempt, "rate limited, backing off");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                other => return other,
            }
        }
    }
}

fn map_fetch_err(err: serenity::Error, what: &str) -> FetchError {
    if let serenity::Error::Http(HttpError::UnsuccessfulRequest(resp)) = &err {
        return match resp.status_code.as_u16() {
            // 401 means the token itself is bad. 403 is a per-channel
            // permission gap and must stay skippable.
            401 => FetchError::Auth(resp.error.message.clone()),
            403 => FetchError::Api(format!("missing access to {what}")),
            404 => FetchError::NotFound(what.to_string()),
            429 => FetchError::RateLimited,
            _ => FetchError::Api(err.to_string()),
        };
    }
    FetchError::Api(err.to_string())
}

fn is_text_like(kind: ChannelType) -> bool {
    matches!(kind, ChannelType::Text | ChannelType::News)
}

fn is_thread(kind: ChannelType) -> bool {
    matches!(
        kind,
        ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread
    )
}

fn map_channel(gc: &GuildChannel) -> Channel {
    Channel {
        id: gc.id.get(),
        guild_id: gc.guild_id.get(),
        name: gc.name.clone(),
        kind: if is_thread(gc.kind) {
            ChannelKind::Thread
        } else {
            ChannelKind::Text
        },
        parent_id: gc.parent_id.map(|id| id.get()),
    }
}

fn map_message(msg: &serenity::model::channel::Message) -> Message {
    Message {
        id: msg.id.get(),
        channel_id: msg.channel_id.get(),
        author: msg.author.name.clone(),
        timestamp: msg.timestamp.with_timezone(&Utc),
        content: msg.content.clone(),
    }
}

#[async_trait]
impl ChatClient for DiscordRestClient {
    async fn fetch_guild(&self, guild_id: u64) -> Result<Guild, FetchError> {
        let http = &self.http;
        let guild = self
            .retry(|| async move {
                http.get_guild(GuildId::new(guild_id))
                    .await
                    .map_err(|e| map_fetch_err(e, &format!("guild {guild_id}")))
            })
            .await?;
        Ok(Guild {
            id: guild.id.get(),
            name: guild.name.clone(),
        })
    }

    async fn list_channels(&self, guild_id: u64) -> Result<Vec<Channel>, FetchError> {
        let http = &self.http;
        let channels = self
            .retry(|| async move {
                http.get_channels(GuildId::new(guild_id))
                    .await
                    .map_err(|e| map_fetch_err(e, &format!("guild {guild_id}")))
            })
            .await?;

        Ok(channels
            .iter()
            .filter(|gc| is_text_like(gc.kind))
            .map(map_channel)
            .collect())
    }

    async fn list_threads(&self, channel_id: u64) -> Result<Vec<Channel>, FetchError> {
        let http = &self.http;

        // The REST API only lists active threads guild-wide, so resolve
        // the channel's guild first and filter by parent.
        let channel = self
            .retry(|| async move {
                http.get_channel(ChannelId::new(channel_id))
                    .await
                    .map_err(|e| map_fetch_err(e, &format!("channel {channel_id}")))
            })
            .await?;
        let guild_id = match channel {
            SerenityChannel::Guild(gc) => gc.guild_id,
            _ => return Ok(Vec::new()),
        };

        let threads = self
            .retry(|| async move {
                http.get_guild_active_threads(guild_id)
                    .await
                    .map_err(|e| map_fetch_err(e, &format!("guild {guild_id} threads")))
            })
            .await?;

        Ok(threads
            .threads
            .iter()
            .filter(|t| t.parent_id.map(|id| id.get()) == Some(channel_id))
            .map(map_channel)
            .collect())
    }

    async fn get_messages(
        &self,
        channel_id: u64,
        limit: usize,
        before: Option<u64>,
    ) -> Result<Vec<Message>, FetchError> {
        let http = &self.http;
        let limit = limit.min(100) as u8;

        let messages = self
            .retry(|| async move {
                let target = before.map(|id| MessagePagination::Before(MessageId::new(id)));
                http.get_messages(ChannelId::new(channel_id), target, Some(limit))
                    .await
                    .map_err(|e| map_fetch_err(e, &format!("channel {channel_id}")))
            })
            .await?;

        Ok(messages.iter().map(map_message).collect())
    }

    async fn get_pinned_messages(&self, channel_id: u64) -> Result<Vec<Message>, FetchError> {
        let http = &self.http;
        let pins = self
            .retry(|| async move {
                http.get_pins(ChannelId::new(channel_id))
                    .await
                    .map_err(|e| map_fetch_err(e, &format!("channel {channel_id}")))
            })
            .await?;
        Ok(pins.iter().map(map_message).collect())
    }
}
