// Message collection: pages backwards through a channel's history
// until the lookback window is exhausted or the history ends.
//
// This is the only place in the pipeline with an iteration policy.
// Stop conditions, checked in order after each page:
//   1. the page came back smaller than requested (history exhausted)
//   2. the oldest fetched message crossed the age cutoff
//   3. the per-channel message cap was reached
// A channel holding exactly one page's worth of messages costs one
// extra (empty) page fetch - that is by construction of condition 1.

use chrono::Utc;

use super::chat_client::{ChatClient, FetchError};
use super::models::{Channel, LookbackWindow, Transcript};
use super::transcript::order_chronologically;

/// Fetches one channel's recent history as an ordered transcript.
pub async fn collect_transcript<C: ChatClient + ?Sized>(
    client: &C,
    channel: &Channel,
    window: &LookbackWindow,
    page_size: usize,
) -> Result<Transcript, FetchError> {
    let cutoff = window.max_age.map(|age| Utc::now() - age);

    let mut collected = Vec::new();
    let mut before = None;
    let mut capped = false;

    loop {
        let page = client.get_messages(channel.id, page_size, before).await?;
        let short_page = page.len() < page_size;

        if let Some(last) = page.last() {
            before = Some(last.id);
        }

        let mut crossed_cutoff = false;
        for msg in page {
            // Pages arrive newest first, so the first message past the
            // cutoff means everything after it is out of window too.
            if let Some(cutoff) = cutoff {
                if msg.timestamp < cutoff {
                    crossed_cutoff = true;
                    break;
                }
            }
            collected.push(msg);
        }

        if short_page {
            break;
        }
        if crossed_cutoff {
            capped = true;
            break;
        }
        if collected.len() >= window.max_messages {
            capped = true;
            break;
        }
    }

    // The cap trims from the old end: collected is newest first here.
    if collected.len() > window.max_messages {
        collected.truncate(window.max_messages);
        capped = true;
    }

    order_chronologically(&mut collected);

    tracing::debug!(
        channel = %channel.name,
        messages = collected.len(),
        capped,
        "collected transcript"
    );

    let mut transcript = Transcript::new(channel.clone(), collected);
    transcript.window_capped = capped;
    Ok(transcript)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::digest::models::ChannelKind;
    use crate::infra::chat::InMemoryChat;
    use chrono::Duration;

    fn channel(id: u64) -> Channel {
        Channel {
            id,
            guild_id: 1,
            name: format!("chan-{id}"),
            kind: ChannelKind::Text,
            parent_id: None,
        }
    }

    #[tokio::test]
    async fn exact_page_size_costs_one_extra_empty_page() {
        let chat = InMemoryChat::new(1, "G1");
        chat.add_channel(channel(5));
        // Exactly one page's worth of messages
        for i in 0..10 {
            chat.add_message(5, i, "alice", Utc::now() - Duration::minutes(10 - i as i64), "hi");
        }

        let window = LookbackWindow {
            max_messages: 100,
            max_age: None,
        };
        let transcript = collect_transcript(&chat, &channel(5), &window, 10)
            .await
            .unwrap();

        assert_eq!(transcript.messages.len(), 10);
        // First page was full, so the collector had to fetch the empty
        // second page to learn the history was exhausted.
        assert_eq!(chat.history_calls(), 2);
        assert!(!transcript.window_capped);
    }

    #[tokio::test]
    async fn short_page_terminates_without_extra_fetch() {
        let chat = InMemoryChat::new(1, "G1");
        chat.add_channel(channel(5));
        for i in 0..7 {
            chat.add_message(5, i, "alice", Utc::now() - Duration::minutes(7 - i as i64), "hi");
        }

        let window = LookbackWindow {
            max_messages: 100,
            max_age: None,
        };
        let transcript = collect_transcript(&chat, &channel(5), &window, 10)
            .await
            .unwrap();

        assert_eq!(transcript.messages.len(), 7);
        assert_eq!(chat.history_calls(), 1);
    }

    #[tokio::test]
    async fn age_cutoff_stops_pagination() {
        let chat = InMemoryChat::new(1, "G1");
        chat.add_channel(channel(5));
        // 20 in-window messages, then 20 stale ones behind them
        for i in 0..20 {
            chat.add_message(5, 100 + i, "alice", Utc::now() - Duration::hours(i as i64), "new");
        }
        for i in 0..20 {
            chat.add_message(5, i, "bob", Utc::now() - Duration::days(30 + i as i64), "old");
        }

        let window = LookbackWindow {
            max_messages: 1000,
            max_age: Some(Duration::days(14)),
        };
        let transcript = collect_transcript(&chat, &channel(5), &window, 10)
            .await
            .unwrap();

        assert_eq!(transcript.messages.len(), 20);
        assert!(transcript.window_capped);
        assert!(transcript.messages.iter().all(|m| m.content == "new"));
    }

    #[tokio::test]
    async fn message_cap_trims_oldest() {
        let chat = InMemoryChat::new(1, "G1");
        chat.add_channel(channel(5));
        for i in 0..35 {
            chat.add_message(5, i, "alice", Utc::now() - Duration::minutes(35 - i as i64), "m");
        }

        let window = LookbackWindow {
            max_messages: 25,
            max_age: None,
        };
        let transcript = collect_transcript(&chat, &channel(5), &window, 10)
            .await
            .unwrap();

        assert_eq!(transcript.messages.len(), 25);
        assert!(transcript.window_capped);
        // The newest 25 survive; ids 0..10 (the oldest) were trimmed.
        assert!(transcript.messages.iter().all(|m| m.id >= 10));
    }

    #[tokio::test]
    async fn transcript_ordering_is_non_decreasing() {
        let chat = InMemoryChat::new(1, "G1");
        chat.add_channel(channel(5));
        for i in 0..23 {
            chat.add_message(5, i, "alice", Utc::now() - Duration::minutes(23 - i as i64), "m");
        }

        let window = LookbackWindow::default();
        let transcript = collect_transcript(&chat, &channel(5), &window, 10)
            .await
            .unwrap();

        for pair in transcript.messages.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[tokio::test]
    async fn unknown_channel_is_not_found() {
        let chat = InMemoryChat::new(1, "G1");
        let err = collect_transcript(&chat, &channel(99), &LookbackWindow::default(), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));
    }
}
