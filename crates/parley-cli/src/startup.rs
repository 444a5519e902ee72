//! Startup wiring: configuration validation, authentication and client construction.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use parley_ai::{LlmClient, OpenAiClient, OpenAiConfig, UnavailableLlmClient};
use parley_forum::{
    RedditApiClient, RedditApiConfig, RedditCommentSource, RedditCredentials, DEFAULT_SEEN_WINDOW,
};
use parley_runtime::{
    approval_channel, spawn_supervised_worker, DedupStore, Mode, Poster, ReplyBotConfig,
    ReplyGenerator, ReviewSession, StreamWorker, BUILTIN_REPLY_TEMPLATE,
};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::cli_args::{GenerationArgs, RedditArgs, WatchArgs};
use crate::review_console::run_review_console;

const REDDIT_RETRY_MAX_ATTEMPTS: usize = 3;
const REDDIT_RETRY_BASE_DELAY_MS: u64 = 500;
const OPENAI_MAX_RETRIES: usize = 2;

pub(crate) fn load_prompt_template(path: Option<&Path>) -> Result<String> {
    let Some(path) = path else {
        return Ok(BUILTIN_REPLY_TEMPLATE.to_string());
    };
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read prompt template {}", path.display()))
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// All four credential values, or none of them.
pub(crate) fn reddit_credentials(args: &RedditArgs) -> Result<Option<RedditCredentials>> {
    let values = [
        non_blank(&args.client_id),
        non_blank(&args.client_secret),
        non_blank(&args.username),
        non_blank(&args.password),
    ];
    match values {
        [Some(client_id), Some(client_secret), Some(username), Some(password)] => {
            Ok(Some(RedditCredentials {
                client_id,
                client_secret,
                username,
                password,
            }))
        }
        [None, None, None, None] => Ok(None),
        _ => bail!(
            "incomplete reddit credentials: --reddit-client-id, --reddit-client-secret, --reddit-username and --reddit-password must be set together"
        ),
    }
}

pub(crate) fn build_reddit_client(
    args: &RedditArgs,
    api_base: &str,
    credentials: Option<RedditCredentials>,
) -> Result<RedditApiClient> {
    RedditApiClient::new(RedditApiConfig {
        api_base: api_base.to_string(),
        auth_base: args.auth_base.clone(),
        user_agent: args.user_agent.clone(),
        credentials,
        request_timeout_ms: args.request_timeout_ms,
        retry_max_attempts: REDDIT_RETRY_MAX_ATTEMPTS,
        retry_base_delay_ms: REDDIT_RETRY_BASE_DELAY_MS,
    })
}

/// Without an API key every draft falls back to the fixed reply.
pub(crate) fn build_llm_client(args: &GenerationArgs) -> Result<Arc<dyn LlmClient>> {
    let Some(api_key) = non_blank(&args.openai_api_key) else {
        warn!("OPENAI_API_KEY is not set; drafts will use the fallback reply");
        return Ok(Arc::new(UnavailableLlmClient));
    };
    let client = OpenAiClient::new(OpenAiConfig {
        api_base: args.openai_api_base.clone(),
        api_key,
        organization: None,
        request_timeout_ms: args.generation_timeout_ms,
        max_retries: OPENAI_MAX_RETRIES,
    })
    .context("failed to create openai client")?;
    Ok(Arc::new(client))
}

pub(crate) fn build_reply_generator(args: &GenerationArgs) -> Result<ReplyGenerator> {
    Ok(ReplyGenerator::new(build_llm_client(args)?, args.model.clone())
        .with_temperature(args.temperature)
        .with_system_prompt(args.system_prompt.clone())
        .with_timeout(Duration::from_millis(args.generation_timeout_ms)))
}

pub(crate) fn build_reply_bot_config(args: &WatchArgs, template: String) -> ReplyBotConfig {
    let mut config = ReplyBotConfig::new(&args.forum, &args.keywords);
    config.mode = Mode::from(args.prompt.mode);
    config.bot_identity = non_blank(&args.bot_username);
    config.dedup_path = args.dedup_file.clone();
    config.prompt_template = template;
    config.reconnect_delay = Duration::from_millis(args.reconnect_delay_ms);
    config.review_tick = Duration::from_millis(args.review_tick_ms);
    config
}

pub(crate) async fn run_watch(args: WatchArgs) -> Result<()> {
    let template = load_prompt_template(args.prompt.prompt_template.as_deref())?;
    let mut config = build_reply_bot_config(&args, template);
    config.validate().context("invalid configuration")?;

    let Some(credentials) = reddit_credentials(&args.reddit)? else {
        bail!("reddit credentials are required for watch mode");
    };
    let reddit = build_reddit_client(&args.reddit, &args.reddit.api_base, Some(credentials))?;
    reddit
        .authenticate()
        .await
        .context("reddit authentication failed")?;
    let identity = reddit
        .resolve_identity()
        .await
        .context("failed to resolve bot identity")?;
    if config.bot_identity.is_none() {
        config.bot_identity = Some(identity);
    }

    let config = Arc::new(config);
    let store = Arc::new(DedupStore::new(config.dedup_path.clone()));
    info!(
        forum = %config.forum,
        mode = %config.mode,
        keywords = config.keywords.len(),
        handled = store.len()?,
        "starting reply bot"
    );

    let (sender, queue) = approval_channel();
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let source = RedditCommentSource::new(
        reddit.clone(),
        Duration::from_millis(args.poll_interval_ms),
        DEFAULT_SEEN_WINDOW,
    );
    let worker = StreamWorker::new(
        Arc::clone(&config),
        Arc::new(source),
        Arc::new(reddit.clone()),
        build_reply_generator(&args.generation)?,
        Arc::clone(&store),
        sender,
    )?;
    let supervisor = spawn_supervised_worker(worker, cancel_rx);

    let session = ReviewSession::new(queue, Poster::new(Arc::new(reddit), store), cancel_tx);
    let summary = run_review_console(session, config.review_tick).await?;
    if let Some(outcome) = summary.final_post {
        info!(comment_id = %outcome.comment_id, status = ?outcome.status, "final post settled");
    }

    match supervisor.await {
        Ok(Some(report)) => info!(
            events = report.events_seen,
            matches = report.matches,
            reconnects = report.reconnects,
            "stream worker finished"
        ),
        Ok(None) => warn!("stream worker terminated abnormally"),
        Err(error) => warn!(%error, "stream worker supervisor failed"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::Parser;
    use tempfile::NamedTempFile;

    use super::{build_reply_bot_config, load_prompt_template, reddit_credentials};
    use crate::cli_args::{Cli, CliCommand, WatchArgs};
    use parley_runtime::{Mode, BUILTIN_REPLY_TEMPLATE};

    fn watch_args(extra: &[&str]) -> WatchArgs {
        let mut argv = vec!["parley", "watch", "--forum", "r/news", "--keywords", "Tax"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).expect("parse").command {
            CliCommand::Watch(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unit_partial_reddit_credentials_are_rejected() {
        let args = watch_args(&["--reddit-client-id", "id"]);
        assert!(reddit_credentials(&args.reddit).is_err());

        let complete = watch_args(&[
            "--reddit-client-id",
            "id",
            "--reddit-client-secret",
            "secret",
            "--reddit-username",
            "bot1",
            "--reddit-password",
            "pw",
        ]);
        let credentials = reddit_credentials(&complete.reddit)
            .expect("credentials")
            .expect("present");
        assert_eq!(credentials.username, "bot1");
    }

    #[test]
    fn functional_watch_args_build_validated_runtime_config() {
        let args = watch_args(&["--mode", "friendly", "--bot-username", " bot1 "]);
        let config = build_reply_bot_config(&args, BUILTIN_REPLY_TEMPLATE.to_string());
        config.validate().expect("valid");
        assert_eq!(config.forum, "news");
        assert_eq!(config.keywords, vec!["tax"]);
        assert_eq!(config.mode, Mode::Friendly);
        assert_eq!(config.bot_identity.as_deref(), Some("bot1"));
    }

    #[test]
    fn regression_template_file_overrides_builtin_and_missing_file_fails() {
        let mut file = NamedTempFile::new().expect("tempfile");
        write!(file, "custom {{{{STANCE}}}}").expect("write");
        let loaded = load_prompt_template(Some(file.path())).expect("load");
        assert_eq!(loaded, "custom {{STANCE}}");
        assert!(load_prompt_template(Some(std::path::Path::new("/nonexistent/parley.md"))).is_err());
        assert_eq!(
            load_prompt_template(None).expect("builtin"),
            BUILTIN_REPLY_TEMPLATE
        );
    }
}
