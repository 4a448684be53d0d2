// This is the entry point of the guild digest tool.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic pipeline)
// - `infra/` = Implementations of core traits (Discord REST, OpenRouter)
// - `rpc/`  = The stdio tool-protocol surface
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Run the digest pipeline, or serve the retrieval tools over stdio

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;
#[path = "rpc/rpc_layer.rs"]
mod rpc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::core::ai::{AiConfig, Summarizer};
use crate::core::digest::{
    report, AnalysisMode, DigestConfig, DigestService, LookbackWindow, PromptTemplate,
};
use crate::infra::ai::OpenRouterClient;
use crate::infra::chat::DiscordRestClient;
use crate::rpc::ToolServer;

#[derive(Parser)]
#[command(
    name = "guild-digest",
    about = "Summarizes recent activity across a Discord guild's channels and threads"
)]
struct Cli {
    /// Guild to digest
    #[arg(long, env = "DIGEST_GUILD_ID")]
    guild: Option<u64>,

    /// Analysis granularity
    #[arg(long, value_enum, default_value = "workspace-overview")]
    mode: AnalysisMode,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Expose the retrieval operations as stdio JSON-RPC tools
    ServeTools,
}

/// Reads an env var with a parsed fallback, like the rest of the
/// DIGEST_* knobs.
fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn digest_config_from_env() -> DigestConfig {
    let lookback_days: i64 = env_parse("DIGEST_LOOKBACK_DAYS", 14);
    // 0 disables the age cutoff and leaves only the message cap
    let max_age = (lookback_days > 0).then(|| chrono::Duration::days(lookback_days));

    DigestConfig {
        window: LookbackWindow {
            max_messages: env_parse("DIGEST_MAX_MESSAGES", 500),
            max_age,
        },
        page_size: env_parse("DIGEST_PAGE_SIZE", 100),
        context_budget: env_parse("DIGEST_CONTEXT_BUDGET", 24_000),
    }
}

async fn run_digest(cli: &Cli, token: &str) -> anyhow::Result<()> {
    let guild_id = cli
        .guild
        .context("no guild selected: pass --guild or set DIGEST_GUILD_ID")?;

    let api_key = std::env::var("OPENROUTER_API_KEY")
        .context("Missing OPENROUTER_API_KEY environment variable")?;
    let ai_config = AiConfig {
        model: env_parse(
            "OPENROUTER_MODEL",
            "deepseek/deepseek-chat-v3.1:free".to_string(),
        ),
        ..AiConfig::default()
    };

    let summarizer = Summarizer::new(OpenRouterClient::new(api_key), ai_config);
    let mut service = DigestService::new(
        DiscordRestClient::new(token),
        summarizer,
        digest_config_from_env(),
    );

    if let Ok(path) = std::env::var("DIGEST_PROMPT_FILE") {
        let template = PromptTemplate::from_file(&path)
            .with_context(|| format!("failed to read prompt template at {path}"))?;
        service = service.with_template(template);
    }

    let digest = service.run(guild_id, cli.mode).await?;
    print!("{}", report::render(&digest));
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "guild_digest=info".into()),
        )
        .init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let token = std::env::var("DISCORD_TOKEN").context(
        "Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token.",
    )?;

    match &cli.command {
        Some(Command::ServeTools) => {
            ToolServer::new(DiscordRestClient::new(&token))
                .run_stdio()
                .await
        }
        None => run_digest(&cli, &token).await,
    }
}
