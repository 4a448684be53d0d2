// Transcript text assembly and context-budget truncation.
//
// The model accepts a bounded context, so transcripts that exceed the
// budget lose their OLDEST messages first - recent activity is what a
// digest is about.

use super::models::{Message, Transcript};

/// Estimates the number of tokens in a text string.
///
/// ~4 characters per token is a reasonable approximation for English;
/// round up to stay conservative.
pub fn estimate_tokens(text: &str) -> usize {
    (text.len() + 3) / 4
}

/// Renders one message the way it appears in the prompt.
pub fn format_message_line(msg: &Message) -> String {
    format!(
        "[{}] {}: {}",
        msg.timestamp.format("%Y-%m-%d %H:%M"),
        msg.author,
        msg.content
    )
}

/// Estimated prompt cost of one message, including its line framing.
fn message_tokens(msg: &Message) -> usize {
    // +1 for the newline joining lines in the rendered transcript
    estimate_tokens(&format_message_line(msg)) + 1
}

/// Sorts messages oldest to newest. Pagination already yields them in
/// order; the sort is the invariant, not the fast path.
pub fn order_chronologically(messages: &mut [Message]) {
    messages.sort_by_key(|m| (m.timestamp, m.id));
}

/// Drops oldest messages until the transcript fits `budget` tokens.
///
/// Truncating an already-truncated transcript to the same budget is a
/// no-op: the kept suffix is determined only by per-message costs and
/// the budget.
pub fn truncate_to_budget(transcript: &mut Transcript, budget: usize) {
    let mut used = 0usize;
    let mut keep_from = transcript.messages.len();

    // Walk newest -> oldest, keeping messages while the budget allows.
    for (idx, msg) in transcript.messages.iter().enumerate().rev() {
        let cost = message_tokens(msg);
        if used + cost > budget {
            break;
        }
        used += cost;
        keep_from = idx;
    }

    let dropped = keep_from;
    if dropped > 0 {
        transcript.messages.drain(..dropped);
        transcript.dropped += dropped;
    }
}

/// The transcript body handed to the prompt template.
pub fn render_transcript(transcript: &Transcript) -> String {
    transcript
        .messages
        .iter()
        .map(format_message_line)
        .collect::<Vec<_>>()
        .join("\n")
}
