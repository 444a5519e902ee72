//! Reddit rate-limit headers and the retry policy that honours them.
//!
//! Reddit reports quota on every OAuth response with `x-ratelimit-remaining`
//! (a float, requests left in the window) and `x-ratelimit-reset` (seconds
//! until the window rolls over). A 429 may or may not carry `Retry-After`.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::StatusCode;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RateLimitHint {
    pub retry_after: Option<Duration>,
    pub remaining: Option<f64>,
    pub reset: Option<Duration>,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)?
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
}

impl RateLimitHint {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let seconds = |name: &str| {
            header_str(headers, name)?
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite() && *value >= 0.0)
                .map(Duration::from_secs_f64)
        };
        Self {
            retry_after: seconds("retry-after"),
            remaining: header_str(headers, "x-ratelimit-remaining")
                .and_then(|raw| raw.parse::<f64>().ok())
                .filter(|value| value.is_finite()),
            reset: seconds("x-ratelimit-reset"),
        }
    }

    /// True when the current window has no whole request left.
    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_some_and(|remaining| remaining < 1.0)
    }

    /// Wait requested by the server: `Retry-After`, else the window reset once the quota is spent.
    pub fn server_wait(&self) -> Option<Duration> {
        self.retry_after
            .or_else(|| self.reset.filter(|_| self.is_exhausted()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Bounded attempts with doubling backoff, floored by any server-requested wait.
pub struct RetryPolicy {
    max_attempts: usize,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: base_delay.max(Duration::from_millis(1)),
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// `attempt` is 1-based and counts the request that just failed.
    pub fn retries_status(&self, attempt: usize, status: StatusCode) -> bool {
        attempt < self.max_attempts
            && (status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error())
    }

    pub fn retries_transport(&self, attempt: usize, error: &reqwest::Error) -> bool {
        attempt < self.max_attempts && (error.is_timeout() || error.is_connect() || error.is_request())
    }

    pub fn delay(&self, attempt: usize, hint: &RateLimitHint) -> Duration {
        if let Some(wait) = hint.server_wait() {
            return wait.max(self.base_delay);
        }
        let exponent = attempt.saturating_sub(1).min(10) as u32;
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(exponent))
            .min(MAX_BACKOFF)
    }
}

pub fn truncate_for_error(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
