// Domain types for the digest pipeline.
//
// Everything here is independent of HTTP and Discord types - the infra
// layer maps platform payloads into these structs, and nothing mutates
// them after creation.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::prompt::AnalysisMode;

/// The community server being digested. Immutable for the run's duration.
#[derive(Debug, Clone, Serialize)]
pub struct Guild {
    pub id: u64,
    pub name: String,
}

/// Whether a conversation container is a top-level channel or a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Text,
    Thread,
}

/// A channel or thread within a guild.
#[derive(Debug, Clone, Serialize)]
pub struct Channel {
    pub id: u64,
    pub guild_id: u64,
    pub name: String,
    pub kind: ChannelKind,
    /// For threads, the id of the parent text channel.
    pub parent_id: Option<u64>,
}

/// One message as fetched from the platform. Immutable once fetched.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: u64,
    pub channel_id: u64,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub content: String,
}

/// Ordered message history for one channel, oldest to newest.
/// Built fresh per run and never persisted.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub channel: Channel,
    pub messages: Vec<Message>,
    /// Messages dropped to fit the model's context budget.
    pub dropped: usize,
    /// True when pagination stopped at the lookback cap rather than at
    /// the start of the channel's history.
    pub window_capped: bool,
}

impl Transcript {
    pub fn new(channel: Channel, messages: Vec<Message>) -> Self {
        Self {
            channel,
            messages,
            dropped: 0,
            window_capped: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Per-channel outcome shown in the final report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryStatus {
    /// The whole collected window made it into the model call.
    Complete,
    /// Some history was dropped (budget truncation or lookback cap).
    Partial { dropped: usize },
    /// No summary could be produced for this channel.
    Unavailable { reason: String },
}

/// One channel's entry in the digest.
#[derive(Debug, Clone)]
pub struct ChannelReport {
    pub channel_id: u64,
    pub channel_name: String,
    pub status: SummaryStatus,
    /// Per-channel summary text (hot-topics mode).
    pub summary: Option<String>,
    /// Messages that made it into the transcript.
    pub message_count: usize,
}

/// The full result of one pipeline run.
#[derive(Debug, Clone)]
pub struct GuildDigest {
    pub guild: Guild,
    pub mode: AnalysisMode,
    pub reports: Vec<ChannelReport>,
    /// Guild-scope summary, present in workspace-overview mode.
    pub overview: Option<String>,
    /// Why the guild-scope summary is missing, if the model call failed.
    pub overview_error: Option<String>,
}

/// How far back the collector walks a channel's history.
#[derive(Debug, Clone, Copy)]
pub struct LookbackWindow {
    /// Hard cap on messages kept per channel.
    pub max_messages: usize,
    /// Messages older than this are outside the window.
    pub max_age: Option<Duration>,
}

impl Default for LookbackWindow {
    fn default() -> Self {
        Self {
            max_messages: 500,
            max_age: Some(Duration::days(14)),
        }
    }
}

/// Tunables for one digest run.
#[derive(Debug, Clone)]
pub struct DigestConfig {
    pub window: LookbackWindow,
    /// Page size for history pagination. Discord's REST maximum is 100.
    pub page_size: usize,
    /// Token budget for transcript text handed to the model.
    pub context_budget: usize,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            window: LookbackWindow::default(),
            page_size: 100,
            context_budget: 24_000,
        }
    }
}
