//! Renders a [`GuildDigest`] as the plain text printed to stdout.
//!
//! The contract: every channel gets exactly one line or block stating
//! whether its summary is complete, partial, or unavailable, and why.

use super::models::{ChannelReport, GuildDigest, SummaryStatus};
use super::prompt::AnalysisMode;

fn status_line(report: &ChannelReport) -> String {
    match &report.status {
        SummaryStatus::Complete => {
            format!("#{} - complete ({} messages)", report.channel_name, report.message_count)
        }
        SummaryStatus::Partial { dropped: 0 } => format!(
            "#{} - partial ({} messages, older history outside the lookback window)",
            report.channel_name, report.message_count
        ),
        SummaryStatus::Partial { dropped } => format!(
            "#{} - partial ({} messages, {} older messages dropped to fit the context budget)",
            report.channel_name, report.message_count, dropped
        ),
        SummaryStatus::Unavailable { reason } => {
            format!("#{} - summary unavailable: {}", report.channel_name, reason)
        }
    }
}

/// Full report text for one run.
pub fn render(digest: &GuildDigest) -> String {
    let mode_label = match digest.mode {
        AnalysisMode::WorkspaceOverview => "workspace overview",
        AnalysisMode::HotTopics => "hot topics",
    };

    let mut out = String::new();
    out.push_str(&format!("Digest for {} ({})\n", digest.guild.name, mode_label));
    out.push_str(&"=".repeat(out.trim_end().len()));
    out.push('\n');

    match digest.mode {
        AnalysisMode::WorkspaceOverview => {
            out.push('\n');
            match (&digest.overview, &digest.overview_error) {
                (Some(text), _) => {
                    out.push_str(text);
                    out.push('\n');
                }
                (None, Some(reason)) => {
                    out.push_str(&format!("Guild overview unavailable: {}\n", reason));
                }
                (None, None) => out.push_str("Guild overview unavailable.\n"),
            }

            out.push_str("\nChannel coverage:\n");
            for report in &digest.reports {
                out.push_str(&format!("  - {}\n", status_line(report)));
            }
        }
        AnalysisMode::HotTopics => {
            for report in &digest.reports {
                out.push('\n');
                out.push_str(&status_line(report));
                out.push('\n');
                if let Some(summary) = &report.summary {
                    out.push_str(summary);
                    out.push('\n');
                }
            }
        }
    }

    out
}
