// The three-stage pipeline: enumerate channels, collect transcripts,
// summarize. One sequential pass; stages communicate only through the
// data they return.
//
// Failure isolation rules:
// - auth failures abort the run (the credential will not get better)
// - a channel that cannot be fetched is skipped and reported
// - a summary that cannot be generated is reported, other channels run

use thiserror::Error;

use crate::core::ai::{ModelError, Summarizer, SummaryProvider};

use super::chat_client::{ChatClient, FetchError};
use super::collector::collect_transcript;
use super::models::{
    Channel, ChannelReport, DigestConfig, Guild, GuildDigest, SummaryStatus, Transcript,
};
use super::prompt::{AnalysisMode, PromptTemplate, PromptVars, PARTIAL_COVERAGE_NOTE};
use super::transcript::{format_message_line, render_transcript, truncate_to_budget};

/// Run-level failure. Per-channel and per-summary failures never show
/// up here - they land in the report instead.
#[derive(Debug, Error)]
pub enum DigestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

pub struct DigestService<C: ChatClient, P: SummaryProvider> {
    client: C,
    summarizer: Summarizer<P>,
    config: DigestConfig,
    /// User-supplied template overriding the built-in one for the mode.
    template_override: Option<PromptTemplate>,
}

impl<C: ChatClient, P: SummaryProvider> DigestService<C, P> {
    pub fn new(client: C, summarizer: Summarizer<P>, config: DigestConfig) -> Self {
        Self {
            client,
            summarizer,
            config,
            template_override: None,
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template_override = Some(template);
        self
    }

    /// Runs the full pipeline for one guild.
    pub async fn run(&self, guild_id: u64, mode: AnalysisMode) -> Result<GuildDigest, DigestError> {
        let guild = self.client.fetch_guild(guild_id).await?;
        let channels = self.enumerate(guild_id).await?;
        tracing::info!(guild = %guild.name, channels = channels.len(), "enumerated guild");

        let collected = self.collect_all(&channels).await?;

        let digest = match mode {
            AnalysisMode::HotTopics => self.summarize_per_channel(guild, collected).await,
            AnalysisMode::WorkspaceOverview => self.summarize_guild(guild, collected).await,
        };
        Ok(digest)
    }

    /// Stage one: channels in enumeration order, each followed by its
    /// active threads so output order stays stable.
    async fn enumerate(&self, guild_id: u64) -> Result<Vec<Channel>, DigestError> {
        let mut enumerated = Vec::new();
        for channel in self.client.list_channels(guild_id).await? {
            let channel_id = channel.id;
            enumerated.push(channel);
            match self.client.list_threads(channel_id).await {
                Ok(threads) => enumerated.extend(threads),
                Err(err) if err.is_fatal() => return Err(err.into()),
                Err(err) => {
                    // The parent channel is still digested; only its
                    // threads are lost.
                    tracing::warn!(channel_id, error = %err, "thread listing failed");
                }
            }
        }
        Ok(enumerated)
    }

    /// Stage two: one transcript per channel, skip-and-continue.
    async fn collect_all(
        &self,
        channels: &[Channel],
    ) -> Result<Vec<(Channel, Result<Transcript, FetchError>)>, DigestError> {
        let mut collected = Vec::with_capacity(channels.len());
        for channel in channels {
            let result = collect_transcript(
                &self.client,
                channel,
                &self.config.window,
                self.config.page_size,
            )
            .await;
            match result {
                Err(err) if err.is_fatal() => return Err(err.into()),
                Err(err) => {
                    tracing::warn!(channel = %channel.name, error = %err, "skipping channel");
                    collected.push((channel.clone(), Err(err)));
                }
                Ok(transcript) => collected.push((channel.clone(), Ok(transcript))),
            }
        }
        Ok(collected)
    }

    fn template_for(&self, mode: AnalysisMode) -> PromptTemplate {
        self.template_override
            .clone()
            .unwrap_or_else(|| PromptTemplate::for_mode(mode))
    }

    /// Transcript text for prompting: budget-truncated, with a partial
    /// note when anything was left out of the window.
    fn prepare_text(&self, transcript: &mut Transcript, budget: usize) -> String {
        truncate_to_budget(transcript, budget);
        let mut text = render_transcript(transcript);
        if transcript.dropped > 0 || transcript.window_capped {
            text.push_str("\n\n");
            text.push_str(PARTIAL_COVERAGE_NOTE);
        }
        text
    }

    fn status_of(transcript: &Transcript) -> SummaryStatus {
        if transcript.dropped > 0 {
            SummaryStatus::Partial {
                dropped: transcript.dropped,
            }
        } else if transcript.window_capped {
            SummaryStatus::Partial { dropped: 0 }
        } else {
            SummaryStatus::Complete
        }
    }

    /// Hot-topics mode: one model call per reachable channel.
    async fn summarize_per_channel(
        &self,
        guild: Guild,
        collected: Vec<(Channel, Result<Transcript, FetchError>)>,
    ) -> GuildDigest {
        let template = self.template_for(AnalysisMode::HotTopics);
        let mut reports = Vec::with_capacity(collected.len());

        for (channel, result) in collected {
            let report = match result {
                Ok(mut transcript) => {
                    if transcript.is_empty() {
                        // Nothing to ask the model about.
                        ChannelReport {
                            channel_id: channel.id,
                            channel_name: channel.name,
                            status: SummaryStatus::Complete,
                            summary: Some("No recent activity.".to_string()),
                            message_count: 0,
                        }
                    } else {
                        let text = self.prepare_text(&mut transcript, self.config.context_budget);
                        let prompt = template.render(&PromptVars {
                            guild_name: &guild.name,
                            channel_name: &channel.name,
                            transcript_text: &text,
                        });
                        match self.summarizer.summarize(&prompt).await {
                            Ok(summary) => ChannelReport {
                                channel_id: channel.id,
                                channel_name: channel.name,
                                status: Self::status_of(&transcript),
                                summary: Some(summary),
                                message_count: transcript.messages.len(),
                            },
                            Err(err) => Self::model_failure(&channel, &transcript, err),
                        }
                    }
                }
                Err(err) => Self::fetch_failure(&channel, err),
            };
            reports.push(report);
        }

        GuildDigest {
            guild,
            mode: AnalysisMode::HotTopics,
            reports,
            overview: None,
            overview_error: None,
        }
    }

    /// Workspace-overview mode: the aggregated transcripts of every
    /// reachable channel go into one model call. The budget is split
    /// evenly across reachable channels and each transcript is
    /// truncated independently, oldest first.
    async fn summarize_guild(
        &self,
        guild: Guild,
        collected: Vec<(Channel, Result<Transcript, FetchError>)>,
    ) -> GuildDigest {
        let reachable = collected.iter().filter(|(_, r)| r.is_ok()).count();
        let per_channel_budget = if reachable > 0 {
            (self.config.context_budget / reachable).max(256)
        } else {
            self.config.context_budget
        };

        let mut reports = Vec::with_capacity(collected.len());
        let mut sections = Vec::new();
        let mut pinned_lines = Vec::new();
        for (channel, result) in collected {
            match result {
                Ok(mut transcript) => {
                    // Pinned messages are curated announcements; they
                    // lead the aggregated prompt. Losing them never
                    // degrades the channel's coverage status.
                    match self.client.get_pinned_messages(channel.id).await {
                        Ok(pins) => pinned_lines.extend(
                            pins.iter()
                                .map(|m| format!("#{}: {}", channel.name, format_message_line(m))),
                        ),
                        Err(err) => {
                            tracing::debug!(channel = %channel.name, error = %err, "pinned fetch failed");
                        }
                    }

                    let body = if transcript.is_empty() {
                        "(no recent activity)".to_string()
                    } else {
                        self.prepare_text(&mut transcript, per_channel_budget)
                    };
                    sections.push(format!("## #{}\n{}", channel.name, body));
                    reports.push(ChannelReport {
                        channel_id: channel.id,
                        channel_name: channel.name,
                        status: Self::status_of(&transcript),
                        summary: None,
                        message_count: transcript.messages.len(),
                    });
                }
                Err(err) => reports.push(Self::fetch_failure(&channel, err)),
            }
        }
        if !pinned_lines.is_empty() {
            sections.insert(
                0,
                format!("## Pinned announcements\n{}", pinned_lines.join("\n")),
            );
        }

        let (overview, overview_error) = if sections.is_empty() {
            (None, Some("no reachable channels".to_string()))
        } else {
            let template = self.template_for(AnalysisMode::WorkspaceOverview);
            let prompt = template.render(&PromptVars {
                guild_name: &guild.name,
                channel_name: "",
                transcript_text: &sections.join("\n\n"),
            });
            match self.summarizer.summarize(&prompt).await {
                Ok(text) => (Some(text), None),
                Err(err) => {
                    tracing::error!(error = %err, "guild overview call failed");
                    (None, Some(err.to_string()))
                }
            }
        };

        GuildDigest {
            guild,
            mode: AnalysisMode::WorkspaceOverview,
            reports,
            overview,
            overview_error,
        }
    }

    fn fetch_failure(channel: &Channel, err: FetchError) -> ChannelReport {
        ChannelReport {
            channel_id: channel.id,
            channel_name: channel.name.clone(),
            status: SummaryStatus::Unavailable {
                reason: err.to_string(),
            },
            summary: None,
            message_count: 0,
        }
    }

    fn model_failure(channel: &Channel, transcript: &Transcript, err: ModelError) -> ChannelReport {
        ChannelReport {
            channel_id: channel.id,
            channel_name: channel.name.clone(),
            status: SummaryStatus::Unavailable {
                reason: err.to_string(),
            },
            summary: None,
            message_count: transcript.messages.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::digest::models::ChannelKind;
    use crate::infra::chat::InMemoryChat;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::sync::{Arc, Mutex};

    /// Records prompts; fails when the prompt contains the poison marker.
    /// Clones share the call log, so tests keep a handle for assertions.
    #[derive(Clone)]
    struct ScriptedProvider {
        fail_on: Option<String>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedProvider {
        fn ok() -> Self {
            Self {
                fail_on: None,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn failing_on(marker: &str) -> Self {
            Self {
                fail_on: Some(marker.to_string()),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl SummaryProvider for ScriptedProvider {
        async fn complete(
            &self,
            prompt: &str,
            _config: &crate::core::ai::AiConfig,
        ) -> Result<String, ModelError> {
            self.calls.lock().unwrap().push(prompt.to_string());
            if let Some(marker) = &self.fail_on {
                if prompt.contains(marker) {
                    return Err(ModelError::Call("upstream 500".to_string()));
                }
            }
            Ok("SUMMARY".to_string())
        }
    }

    fn channel(id: u64, name: &str) -> Channel {
        Channel {
            id,
            guild_id: 1,
            name: name.to_string(),
            kind: ChannelKind::Text,
            parent_id: None,
        }
    }

    fn service(
        chat: InMemoryChat,
        provider: &ScriptedProvider,
    ) -> DigestService<InMemoryChat, ScriptedProvider> {
        let summarizer = Summarizer::new(provider.clone(), crate::core::ai::AiConfig::default());
        DigestService::new(chat, summarizer, DigestConfig::default())
    }

    #[tokio::test]
    async fn scenario_one_reachable_one_unreachable() {
        // Guild "G1": "general" has 3 messages spanning 2 days,
        // "random" exists in the listing but its history is gone.
        let chat = InMemoryChat::new(1, "G1");
        chat.add_channel(channel(10, "general"));
        chat.add_channel(channel(11, "random"));
        chat.fail_channel(11);
        chat.add_message(10, 1, "alice", Utc::now() - Duration::days(2), "day one kickoff");
        chat.add_message(10, 2, "bob", Utc::now() - Duration::days(1), "progress update");
        chat.add_message(10, 3, "alice", Utc::now(), "wrapping up");

        let provider = ScriptedProvider::ok();
        let digest = service(chat, &provider)
            .run(1, AnalysisMode::HotTopics)
            .await
            .unwrap();

        assert_eq!(digest.reports.len(), 2);

        let general = &digest.reports[0];
        assert_eq!(general.channel_name, "general");
        assert_eq!(general.status, SummaryStatus::Complete);
        assert_eq!(general.message_count, 3);
        assert_eq!(general.summary.as_deref(), Some("SUMMARY"));

        let random = &digest.reports[1];
        assert_eq!(random.channel_name, "random");
        assert!(matches!(random.status, SummaryStatus::Unavailable { .. }));
        assert!(random.summary.is_none());

        // All three messages made it into the one prompt issued
        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains("day one kickoff"));
        assert!(calls[0].contains("progress update"));
        assert!(calls[0].contains("wrapping up"));
    }

    #[tokio::test]
    async fn report_counts_match_reachability() {
        let chat = InMemoryChat::new(1, "G1");
        for id in 0..5u64 {
            chat.add_channel(channel(id, &format!("chan-{id}")));
            chat.add_message(id, id * 100, "alice", Utc::now(), "hello");
        }
        chat.fail_channel(1);
        chat.fail_channel(3);

        let provider = ScriptedProvider::ok();
        let digest = service(chat, &provider)
            .run(1, AnalysisMode::HotTopics)
            .await
            .unwrap();

        let summaries = digest
            .reports
            .iter()
            .filter(|r| !matches!(r.status, SummaryStatus::Unavailable { .. }))
            .count();
        let markers: Vec<&str> = digest
            .reports
            .iter()
            .filter(|r| matches!(r.status, SummaryStatus::Unavailable { .. }))
            .map(|r| r.channel_name.as_str())
            .collect();

        assert_eq!(summaries, 3);
        assert_eq!(markers, vec!["chan-1", "chan-3"]);
    }

    #[tokio::test]
    async fn model_failure_is_isolated_per_channel() {
        let chat = InMemoryChat::new(1, "G1");
        chat.add_channel(channel(10, "general"));
        chat.add_channel(channel(11, "dev"));
        chat.add_message(10, 1, "alice", Utc::now(), "POISON topic");
        chat.add_message(11, 2, "bob", Utc::now(), "calm discussion");

        let provider = ScriptedProvider::failing_on("POISON");
        let digest = service(chat, &provider)
            .run(1, AnalysisMode::HotTopics)
            .await
            .unwrap();

        assert!(matches!(
            digest.reports[0].status,
            SummaryStatus::Unavailable { .. }
        ));
        assert_eq!(digest.reports[1].status, SummaryStatus::Complete);
        assert_eq!(digest.reports[1].summary.as_deref(), Some("SUMMARY"));
    }

    #[tokio::test]
    async fn workspace_overview_makes_one_call() {
        let chat = InMemoryChat::new(1, "G1");
        chat.add_channel(channel(10, "general"));
        chat.add_channel(channel(11, "dev"));
        chat.add_message(10, 1, "alice", Utc::now(), "alpha release shipped");
        chat.add_message(11, 2, "bob", Utc::now(), "refactor landed");

        let provider = ScriptedProvider::ok();
        let digest = service(chat, &provider)
            .run(1, AnalysisMode::WorkspaceOverview)
            .await
            .unwrap();

        assert_eq!(digest.overview.as_deref(), Some("SUMMARY"));
        assert!(digest.overview_error.is_none());
        assert!(digest.reports.iter().all(|r| r.summary.is_none()));

        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains("## #general"));
        assert!(calls[0].contains("## #dev"));
        assert!(calls[0].contains("alpha release shipped"));
        assert!(calls[0].contains("refactor landed"));
    }

    #[tokio::test]
    async fn pinned_messages_lead_the_overview_prompt() {
        let chat = InMemoryChat::new(1, "G1");
        chat.add_channel(channel(10, "general"));
        chat.add_message(10, 1, "alice", Utc::now(), "v2.0 is out");
        chat.add_message(10, 2, "bob", Utc::now(), "nice");
        chat.pin_message(1);

        let provider = ScriptedProvider::ok();
        service(chat, &provider)
            .run(1, AnalysisMode::WorkspaceOverview)
            .await
            .unwrap();

        let calls = provider.calls.lock().unwrap();
        let prompt = &calls[0];
        assert!(prompt.contains("## Pinned announcements"));
        assert!(prompt.contains("v2.0 is out"));
        // Announcements come before the per-channel sections
        assert!(
            prompt.find("Pinned announcements").unwrap() < prompt.find("## #general").unwrap()
        );
    }

    #[tokio::test]
    async fn overview_failure_keeps_coverage_report() {
        let chat = InMemoryChat::new(1, "G1");
        chat.add_channel(channel(10, "general"));
        chat.add_message(10, 1, "alice", Utc::now(), "POISON");

        let provider = ScriptedProvider::failing_on("POISON");
        let digest = service(chat, &provider)
            .run(1, AnalysisMode::WorkspaceOverview)
            .await
            .unwrap();

        assert!(digest.overview.is_none());
        assert!(digest.overview_error.is_some());
        assert_eq!(digest.reports.len(), 1);
        assert_eq!(digest.reports[0].status, SummaryStatus::Complete);
    }

    #[tokio::test]
    async fn auth_failure_aborts_the_run() {
        let chat = InMemoryChat::new(1, "G1");
        chat.fail_auth();

        let provider = ScriptedProvider::ok();
        let err = service(chat, &provider)
            .run(1, AnalysisMode::HotTopics)
            .await
            .unwrap_err();
        assert!(matches!(err, DigestError::Fetch(FetchError::Auth(_))));
    }

    #[tokio::test]
    async fn unknown_guild_aborts_the_run() {
        let chat = InMemoryChat::new(1, "G1");
        let provider = ScriptedProvider::ok();
        let err = service(chat, &provider)
            .run(999, AnalysisMode::HotTopics)
            .await
            .unwrap_err();
        assert!(matches!(err, DigestError::Fetch(FetchError::NotFound(_))));
    }

    #[tokio::test]
    async fn threads_follow_their_parent_channel() {
        let chat = InMemoryChat::new(1, "G1");
        chat.add_channel(channel(10, "general"));
        chat.add_channel(channel(20, "dev"));
        chat.add_thread(10, 15, "general-thread");
        chat.add_message(10, 1, "alice", Utc::now(), "a");
        chat.add_message(15, 2, "bob", Utc::now(), "b");
        chat.add_message(20, 3, "carol", Utc::now(), "c");

        let provider = ScriptedProvider::ok();
        let digest = service(chat, &provider)
            .run(1, AnalysisMode::HotTopics)
            .await
            .unwrap();

        let names: Vec<&str> = digest
            .reports
            .iter()
            .map(|r| r.channel_name.as_str())
            .collect();
        assert_eq!(names, vec!["general", "general-thread", "dev"]);
    }

    #[tokio::test]
    async fn custom_template_overrides_builtin() {
        let chat = InMemoryChat::new(1, "G1");
        chat.add_channel(channel(10, "general"));
        chat.add_message(10, 1, "alice", Utc::now(), "hello");

        let provider = ScriptedProvider::ok();
        let summarizer = Summarizer::new(provider.clone(), crate::core::ai::AiConfig::default());
        let service = DigestService::new(chat, summarizer, DigestConfig::default())
            .with_template(PromptTemplate::from_text("CUSTOM {transcript_text}"));

        service.run(1, AnalysisMode::HotTopics).await.unwrap();

        let calls = provider.calls.lock().unwrap();
        assert!(calls[0].starts_with("CUSTOM "));
        assert!(calls[0].contains("hello"));
    }
}
