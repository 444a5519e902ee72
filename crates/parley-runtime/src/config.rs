use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};

use crate::keyword_filter::normalize_keywords;
use crate::prompt_modes::{compose_mode_prompt, validate_all_modes, Mode, BUILTIN_REPLY_TEMPLATE};

pub const DEFAULT_DEDUP_FILE: &str = "replied_comments.txt";
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 10_000;
pub const DEFAULT_REVIEW_TICK_MS: u64 = 500;

#[derive(Debug, Clone)]
/// Immutable runtime settings shared by the stream worker and review loop.
pub struct ReplyBotConfig {
    pub forum: String,
    /// Lower-cased; the first match in this order wins.
    pub keywords: Vec<String>,
    pub mode: Mode,
    /// Bot account name; `None` disables the self-authored check.
    pub bot_identity: Option<String>,
    pub dedup_path: PathBuf,
    pub prompt_template: String,
    pub reconnect_delay: Duration,
    pub review_tick: Duration,
}

impl ReplyBotConfig {
    pub fn new(forum: &str, keywords: &[String]) -> Self {
        Self {
            forum: normalize_forum(forum),
            keywords: normalize_keywords(keywords),
            mode: Mode::default(),
            bot_identity: None,
            dedup_path: PathBuf::from(DEFAULT_DEDUP_FILE),
            prompt_template: BUILTIN_REPLY_TEMPLATE.to_string(),
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            review_tick: Duration::from_millis(DEFAULT_REVIEW_TICK_MS),
        }
    }

    /// Startup checks; any failure here is fatal before a stream is opened.
    pub fn validate(&self) -> Result<()> {
        if self.forum.is_empty() {
            bail!("target forum is not configured");
        }
        if self.keywords.is_empty() {
            bail!("no keywords configured");
        }
        if self.reconnect_delay.is_zero() {
            bail!("reconnect delay must be greater than 0");
        }
        if self.review_tick.is_zero() {
            bail!("review tick must be greater than 0");
        }
        validate_all_modes(&self.prompt_template)
    }

    pub fn mode_prompt(&self) -> Result<String> {
        Ok(compose_mode_prompt(self.mode, &self.prompt_template)?)
    }
}

/// Accepts `news`, `r/news` or `/r/news/`.
pub fn normalize_forum(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    trimmed
        .strip_prefix("r/")
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}
