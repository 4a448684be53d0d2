// Fixture-backed in-memory implementation of ChatClient.
//
// Lets the pipeline run against scripted guild content without network
// access. The collector and digest tests drive all their scenarios
// through this; failure injection covers the skip-and-continue paths.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::digest::{Channel, ChannelKind, ChatClient, FetchError, Guild, Message};

pub struct InMemoryChat {
    guild: Guild,
    channels: Mutex<Vec<Channel>>,
    messages: Mutex<Vec<Message>>,
    pinned: Mutex<Vec<u64>>,
    /// Channels whose history fetch fails with NotFound.
    failed_channels: Mutex<HashSet<u64>>,
    auth_failed: Mutex<bool>,
    history_calls: AtomicUsize,
}

impl InMemoryChat {
    pub fn new(guild_id: u64, guild_name: &str) -> Self {
        Self {
            guild: Guild {
                id: guild_id,
                name: guild_name.to_string(),
            },
            channels: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
            pinned: Mutex::new(Vec::new()),
            failed_channels: Mutex::new(HashSet::new()),
            auth_failed: Mutex::new(false),
            history_calls: AtomicUsize::new(0),
        }
    }

    pub fn add_channel(&self, channel: Channel) {
        self.channels.lock().unwrap().push(channel);
    }

    pub fn add_thread(&self, parent_id: u64, id: u64, name: &str) {
        self.channels.lock().unwrap().push(Channel {
            id,
            guild_id: self.guild.id,
            name: name.to_string(),
            kind: ChannelKind::Thread,
            parent_id: Some(parent_id),
        });
    }

    pub fn add_message(
        &self,
        channel_id: u64,
        id: u64,
        author: &str,
        timestamp: DateTime<Utc>,
        content: &str,
    ) {
        self.messages.lock().unwrap().push(Message {
            id,
            channel_id,
            author: author.to_string(),
            timestamp,
            content: content.to_string(),
        });
    }

    pub fn pin_message(&self, message_id: u64) {
        self.pinned.lock().unwrap().push(message_id);
    }

    /// Makes history fetches for this channel fail with NotFound.
    pub fn fail_channel(&self, channel_id: u64) {
        self.failed_channels.lock().unwrap().insert(channel_id);
    }

    /// Makes every call fail with an auth error.
    pub fn fail_auth(&self) {
        *self.auth_failed.lock().unwrap() = true;
    }

    /// Number of get_messages calls served so far.
    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    fn check_auth(&self) -> Result<(), FetchError> {
        if *self.auth_failed.lock().unwrap() {
            return Err(FetchError::Auth("token rejected".to_string()));
        }
        Ok(())
    }

    fn check_channel(&self, channel_id: u64) -> Result<(), FetchError> {
        if self.failed_channels.lock().unwrap().contains(&channel_id) {
            return Err(FetchError::NotFound(format!("channel {channel_id}")));
        }
        let known = self
            .channels
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.id == channel_id);
        if !known {
            return Err(FetchError::NotFound(format!("channel {channel_id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatClient for InMemoryChat {
    async fn fetch_guild(&self, guild_id: u64) -> Result<Guild, FetchError> {
        self.check_auth()?;
        if guild_id != self.guild.id {
            return Err(FetchError::NotFound(format!("guild {guild_id}")));
        }
        Ok(self.guild.clone())
    }

    async fn list_channels(&self, guild_id: u64) -> Result<Vec<Channel>, FetchError> {
        self.check_auth()?;
        if guild_id != self.guild.id {
            return Err(FetchError::NotFound(format!("guild {guild_id}")));
        }
        Ok(self
            .channels
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.kind == ChannelKind::Text)
            .cloned()
            .collect())
    }

    async fn list_threads(&self, channel_id: u64) -> Result<Vec<Channel>, FetchError> {
        self.check_auth()?;
        Ok(self
            .channels
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.kind == ChannelKind::Thread && c.parent_id == Some(channel_id))
            .cloned()
            .collect())
    }

    async fn get_messages(
        &self,
        channel_id: u64,
        limit: usize,
        before: Option<u64>,
    ) -> Result<Vec<Message>, FetchError> {
        self.check_auth()?;
        self.check_channel(channel_id)?;
        self.history_calls.fetch_add(1, Ordering::SeqCst);

        // Newest first, like the platform API.
        let mut history: Vec<Message> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.channel_id == channel_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| (b.timestamp, b.id).cmp(&(a.timestamp, a.id)));

        let start = match before {
            Some(before_id) => match history.iter().position(|m| m.id == before_id) {
                Some(pos) => pos + 1,
                None => history.len(),
            },
            None => 0,
        };

        Ok(history.into_iter().skip(start).take(limit).collect())
    }

    async fn get_pinned_messages(&self, channel_id: u64) -> Result<Vec<Message>, FetchError> {
        self.check_auth()?;
        self.check_channel(channel_id)?;
        let pinned = self.pinned.lock().unwrap();
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.channel_id == channel_id && pinned.contains(&m.id))
            .cloned()
            .collect())
    }
}
