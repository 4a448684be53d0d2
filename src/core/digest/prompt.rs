// Prompt templates for the two analysis granularities.
//
// The original bot shipped one "agent" per granularity; here each is a
// pure template selected by `AnalysisMode`, rendered over the same
// transcript data.

use clap::ValueEnum;

/// Which digest the model is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AnalysisMode {
    /// Guild scope: one summary over every channel's transcript.
    WorkspaceOverview,
    /// Channel scope: one summary per channel, focused on what drew
    /// engagement.
    HotTopics,
}

/// Placeholders recognized by [`PromptTemplate::render`].
#[derive(Debug, Clone, Default)]
pub struct PromptVars<'a> {
    pub guild_name: &'a str,
    pub channel_name: &'a str,
    pub transcript_text: &'a str,
}

const WORKSPACE_OVERVIEW_TEMPLATE: &str = "\
You are a community analyst for the Discord server \"{guild_name}\".
Below is the recent message history, grouped by channel and thread.

Produce a holistic digest of the server:
- Recent activity overview: what is happening across channels right now.
- Key discussions and topics, grouped by theme.
- Decisions made or forming: what was decided, by whom, and why.
- Key participants: who drives discussions and who makes calls.
- Open questions and next steps worth following up on.

Be concrete and neutral. Skip filler messages and one-word reactions.

{transcript_text}";

const HOT_TOPICS_TEMPLATE: &str = "\
You are a community analyst for the Discord server \"{guild_name}\".
Below is the recent message history of the channel \"{channel_name}\".

Summarize the hot topics of this channel:
- The most engaging discussions and what they concluded, if anything.
- Announcements or decisions, with who made them.
- Anything actionable a member catching up should know.

Be brief and concrete. Skip filler messages and one-word reactions.

{transcript_text}";

/// Appended to the transcript section when older messages were dropped,
/// so the model does not present a window as the whole history.
pub const PARTIAL_COVERAGE_NOTE: &str =
    "Note: this transcript is partial - older messages were omitted to fit the context budget.";

/// A prompt template with `{placeholder}` substitution.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    /// Built-in template for the given mode.
    pub fn for_mode(mode: AnalysisMode) -> Self {
        let text = match mode {
            AnalysisMode::WorkspaceOverview => WORKSPACE_OVERVIEW_TEMPLATE,
            AnalysisMode::HotTopics => HOT_TOPICS_TEMPLATE,
        };
        Self {
            text: text.to_string(),
        }
    }

    /// Template loaded from user-supplied text (`DIGEST_PROMPT_FILE`).
    pub fn from_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Template loaded from a file on disk.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        Ok(Self::from_text(std::fs::read_to_string(path)?))
    }

    /// Substitutes the recognized placeholders. Brace sequences that are
    /// not `{guild_name}`, `{channel_name}` or `{transcript_text}` pass
    /// through verbatim.
    pub fn render(&self, vars: &PromptVars<'_>) -> String {
        self.text
            .replace("{guild_name}", vars.guild_name)
            .replace("{channel_name}", vars.channel_name)
            .replace("{transcript_text}", vars.transcript_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_all_recognized_placeholders() {
        let template =
            PromptTemplate::from_text("g={guild_name} c={channel_name}\n{transcript_text}");
        let rendered = template.render(&PromptVars {
            guild_name: "G1",
            channel_name: "general",
            transcript_text: "alice: hi",
        });
        assert_eq!(rendered, "g=G1 c=general\nalice: hi");
    }

    #[test]
    fn unrecognized_braces_pass_through() {
        let template = PromptTemplate::from_text("{guild_name} {json: true} {not_a_var}");
        let rendered = template.render(&PromptVars {
            guild_name: "G1",
            ..Default::default()
        });
        assert_eq!(rendered, "G1 {json: true} {not_a_var}");
    }

    #[test]
    fn template_file_override_round_trips() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "override for {{guild_name}}: {{transcript_text}}").unwrap();

        let template = PromptTemplate::from_file(file.path()).unwrap();
        let rendered = template.render(&PromptVars {
            guild_name: "G1",
            channel_name: "",
            transcript_text: "body",
        });
        assert_eq!(rendered, "override for G1: body");
    }

    #[test]
    fn builtin_templates_reference_the_transcript() {
        for mode in [AnalysisMode::WorkspaceOverview, AnalysisMode::HotTopics] {
            let rendered = PromptTemplate::for_mode(mode).render(&PromptVars {
                guild_name: "G1",
                channel_name: "general",
                transcript_text: "MARKER",
            });
            assert!(rendered.contains("MARKER"));
            assert!(rendered.contains("G1"));
            assert!(!rendered.contains("{transcript_text}"));
        }
    }
}
