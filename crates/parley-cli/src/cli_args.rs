use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use parley_ai::DEFAULT_OPENAI_API_BASE;
use parley_forum::{
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_REDDIT_API_BASE, DEFAULT_REDDIT_AUTH_BASE,
    DEFAULT_REDDIT_PUBLIC_BASE, DEFAULT_REDDIT_USER_AGENT,
};
use parley_runtime::{
    Mode, DEFAULT_DEDUP_FILE, DEFAULT_GENERATION_TIMEOUT_MS, DEFAULT_MODEL,
    DEFAULT_RECONNECT_DELAY_MS, DEFAULT_REVIEW_TICK_MS, DEFAULT_SYSTEM_PROMPT,
    DEFAULT_TEMPERATURE,
};

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_temperature(value: &str) -> Result<f32, String> {
    let parsed = value
        .parse::<f32>()
        .map_err(|error| format!("failed to parse float: {error}"))?;
    if !parsed.is_finite() || !(0.0..=2.0).contains(&parsed) {
        return Err("value must be in range 0.0..=2.0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliMode {
    Standard,
    Agree,
    Friendly,
    Dunk,
    FactCheck,
}

impl From<CliMode> for Mode {
    fn from(value: CliMode) -> Self {
        match value {
            CliMode::Standard => Mode::Standard,
            CliMode::Agree => Mode::Agree,
            CliMode::Friendly => Mode::Friendly,
            CliMode::Dunk => Mode::Dunk,
            CliMode::FactCheck => Mode::FactCheck,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "parley",
    about = "Supervised Reddit reply bot with human approval",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Watch a subreddit and review drafted replies in the terminal.
    Watch(WatchArgs),
    /// Print the mode prompt and transcript for a comment permalink.
    Scrape(ScrapeArgs),
    /// Print the resolved prompt for a mode.
    Prompt(PromptArgs),
    /// List available modes.
    Modes,
}

#[derive(Debug, Clone, Args)]
pub struct PromptTemplateArgs {
    #[arg(
        long,
        env = "PARLEY_MODE",
        value_enum,
        default_value = "standard",
        help = "Reply mode controlling stance and tone"
    )]
    pub mode: CliMode,

    #[arg(
        long = "prompt-template",
        env = "PARLEY_PROMPT_TEMPLATE",
        help = "Optional prompt template file replacing the built-in template"
    )]
    pub prompt_template: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct RedditArgs {
    #[arg(long = "reddit-client-id", env = "REDDIT_CLIENT_ID")]
    pub client_id: Option<String>,

    #[arg(long = "reddit-client-secret", env = "REDDIT_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    #[arg(long = "reddit-username", env = "REDDIT_USERNAME")]
    pub username: Option<String>,

    #[arg(long = "reddit-password", env = "REDDIT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[arg(
        long = "reddit-user-agent",
        env = "REDDIT_USER_AGENT",
        default_value = DEFAULT_REDDIT_USER_AGENT
    )]
    pub user_agent: String,

    #[arg(
        long = "reddit-api-base",
        env = "REDDIT_API_BASE",
        default_value = DEFAULT_REDDIT_API_BASE,
        help = "Base URL for authenticated Reddit API calls"
    )]
    pub api_base: String,

    #[arg(
        long = "reddit-auth-base",
        env = "REDDIT_AUTH_BASE",
        default_value = DEFAULT_REDDIT_AUTH_BASE,
        help = "Base URL for the Reddit OAuth token endpoint"
    )]
    pub auth_base: String,

    #[arg(
        long = "reddit-public-base",
        env = "REDDIT_PUBLIC_BASE",
        default_value = DEFAULT_REDDIT_PUBLIC_BASE,
        help = "Base URL for anonymous thread fetches"
    )]
    pub public_base: String,

    #[arg(
        long = "request-timeout-ms",
        env = "PARLEY_REQUEST_TIMEOUT_MS",
        default_value_t = 20_000,
        value_parser = parse_positive_u64,
        help = "Per-request HTTP timeout for Reddit calls"
    )]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Args)]
pub struct GenerationArgs {
    #[arg(long = "openai-api-key", env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(
        long = "openai-api-base",
        env = "OPENAI_API_BASE",
        default_value = DEFAULT_OPENAI_API_BASE
    )]
    pub openai_api_base: String,

    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    #[arg(
        long,
        env = "OPENAI_TEMPERATURE",
        default_value_t = DEFAULT_TEMPERATURE,
        value_parser = parse_temperature
    )]
    pub temperature: f32,

    #[arg(
        long = "system-prompt",
        env = "PARLEY_SYSTEM_PROMPT",
        default_value = DEFAULT_SYSTEM_PROMPT
    )]
    pub system_prompt: String,

    #[arg(
        long = "generation-timeout-ms",
        env = "PARLEY_GENERATION_TIMEOUT_MS",
        default_value_t = DEFAULT_GENERATION_TIMEOUT_MS,
        value_parser = parse_positive_u64
    )]
    pub generation_timeout_ms: u64,
}

#[derive(Debug, Clone, Args)]
pub struct WatchArgs {
    #[arg(long, env = "PARLEY_FORUM", help = "Subreddit to watch (with or without r/)")]
    pub forum: String,

    #[arg(
        long,
        env = "PARLEY_KEYWORDS",
        value_delimiter = ',',
        required = true,
        help = "Trigger keywords; the first match in this order is reported"
    )]
    pub keywords: Vec<String>,

    #[arg(
        long = "bot-username",
        env = "PARLEY_BOT_USERNAME",
        help = "Override the account name used to skip the bot's own comments"
    )]
    pub bot_username: Option<String>,

    #[arg(
        long = "dedup-file",
        env = "PARLEY_DEDUP_FILE",
        default_value = DEFAULT_DEDUP_FILE
    )]
    pub dedup_file: PathBuf,

    #[arg(
        long = "poll-interval-ms",
        env = "PARLEY_POLL_INTERVAL_MS",
        default_value_t = DEFAULT_POLL_INTERVAL_MS,
        value_parser = parse_positive_u64
    )]
    pub poll_interval_ms: u64,

    #[arg(
        long = "reconnect-delay-ms",
        env = "PARLEY_RECONNECT_DELAY_MS",
        default_value_t = DEFAULT_RECONNECT_DELAY_MS,
        value_parser = parse_positive_u64
    )]
    pub reconnect_delay_ms: u64,

    #[arg(
        long = "review-tick-ms",
        env = "PARLEY_REVIEW_TICK_MS",
        default_value_t = DEFAULT_REVIEW_TICK_MS,
        value_parser = parse_positive_u64
    )]
    pub review_tick_ms: u64,

    #[command(flatten)]
    pub prompt: PromptTemplateArgs,

    #[command(flatten)]
    pub reddit: RedditArgs,

    #[command(flatten)]
    pub generation: GenerationArgs,
}

#[derive(Debug, Clone, Args)]
pub struct ScrapeArgs {
    #[arg(help = "Reddit comment permalink or share link")]
    pub url: String,

    #[command(flatten)]
    pub prompt: PromptTemplateArgs,

    #[command(flatten)]
    pub reddit: RedditArgs,
}

#[derive(Debug, Clone, Args)]
pub struct PromptArgs {
    #[command(flatten)]
    pub prompt: PromptTemplateArgs,
}
