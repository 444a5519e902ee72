//! Reddit REST client: OAuth password grant, listings, parent lookup and replies.

use std::time::{Duration, Instant};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::listing::{parse_comment_listing, parse_info_listing, parse_thread_listing};
use crate::rate_limit::{truncate_for_error, RateLimitHint, RetryPolicy};
use crate::{
    CommentEvent, ParentNode, PermalinkRef, PostedReply, ReplyPublisher, ThreadLookup,
    ThreadSnapshot,
};

pub const DEFAULT_REDDIT_API_BASE: &str = "https://oauth.reddit.com";
pub const DEFAULT_REDDIT_AUTH_BASE: &str = "https://www.reddit.com";
pub const DEFAULT_REDDIT_PUBLIC_BASE: &str = "https://www.reddit.com";
pub const DEFAULT_REDDIT_USER_AGENT: &str = "parley/0.1 (supervised reply bot)";
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
const LISTING_PAGE_LIMIT: &str = "100";

#[derive(Debug, Clone)]
/// Script-app credentials for the OAuth password grant.
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
/// Connection settings for `RedditApiClient`.
pub struct RedditApiConfig {
    pub api_base: String,
    pub auth_base: String,
    pub user_agent: String,
    /// `None` issues anonymous requests (public JSON endpoints only).
    pub credentials: Option<RedditCredentials>,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentSubmitResponse {
    json: CommentSubmitBody,
}

#[derive(Debug, Deserialize)]
struct CommentSubmitBody {
    #[serde(default)]
    errors: Vec<Value>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Clone)]
/// Reddit API client shared by the stream source, thread walks and the poster.
pub struct RedditApiClient {
    http: reqwest::Client,
    config: RedditApiConfig,
    retry: RetryPolicy,
    token: Arc<RwLock<Option<AccessToken>>>,
}

impl RedditApiClient {
    pub fn new(config: RedditApiConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_str(config.user_agent.trim())
                .context("invalid reddit user agent header")?,
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .context("failed to create reddit api client")?;
        let retry = RetryPolicy::new(
            config.retry_max_attempts,
            Duration::from_millis(config.retry_base_delay_ms),
        );
        Ok(Self {
            http,
            retry,
            config: RedditApiConfig {
                api_base: config.api_base.trim_end_matches('/').to_string(),
                auth_base: config.auth_base.trim_end_matches('/').to_string(),
                retry_max_attempts: config.retry_max_attempts.max(1),
                retry_base_delay_ms: config.retry_base_delay_ms.max(1),
                ..config
            },
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Performs the password grant eagerly so credential problems surface at startup.
    pub async fn authenticate(&self) -> Result<()> {
        let token = self.request_access_token().await?;
        *self.token.write().await = Some(token);
        Ok(())
    }

    /// Returns the username the credentials belong to.
    pub async fn resolve_identity(&self) -> Result<String> {
        #[derive(Deserialize)]
        struct Me {
            name: String,
        }

        let me: Me = self
            .request_json("resolve identity", || {
                self.http.get(format!("{}/api/v1/me", self.config.api_base))
            })
            .await?;
        let name = me.name.trim().to_string();
        if name.is_empty() {
            bail!("reddit identity lookup returned an empty username");
        }
        info!(username = %name, "authenticated with reddit");
        Ok(name)
    }

    /// Newest comments in `forum`, newest first as Reddit returns them.
    pub async fn list_new_comments(&self, forum: &str) -> Result<Vec<CommentEvent>> {
        let forum = forum.trim().trim_start_matches("r/");
        let listing: Value = self
            .request_json("list new comments", || {
                self.http
                    .get(format!("{}/r/{forum}/comments", self.config.api_base))
                    .query(&[("limit", LISTING_PAGE_LIMIT), ("raw_json", "1")])
            })
            .await?;
        parse_comment_listing(listing)
    }

    /// Fetches a thread rendering (`<permalink>.json?context=10000`).
    pub async fn fetch_thread(&self, permalink: &PermalinkRef) -> Result<ThreadSnapshot> {
        let path = permalink.json_path();
        let payload: Value = self
            .request_json("fetch thread", || {
                self.http
                    .get(format!("{}{path}", self.config.api_base))
                    .query(&[("context", "10000"), ("raw_json", "1")])
            })
            .await?;
        parse_thread_listing(payload)
    }

    async fn request_access_token(&self) -> Result<AccessToken> {
        let credentials = self
            .config
            .credentials
            .as_ref()
            .ok_or_else(|| anyhow!("reddit credentials are not configured"))?;
        let response = self
            .http
            .post(format!("{}/api/v1/access_token", self.config.auth_base))
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
            ])
            .send()
            .await
            .context("reddit token request failed")?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            bail!(
                "reddit token request failed with status {}: {}",
                status.as_u16(),
                truncate_for_error(&body, 400)
            );
        }
        // Reddit reports bad credentials as a 200 carrying an `error` field.
        let parsed = serde_json::from_str::<TokenResponse>(&body)
            .context("failed to decode reddit token response")?;
        if let Some(error) = parsed.error {
            bail!("reddit rejected credentials: {error}");
        }
        let value = parsed
            .access_token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| anyhow!("reddit token response did not include an access token"))?;
        let lifetime = Duration::from_secs(parsed.expires_in.unwrap_or(3_600));
        debug!(lifetime_secs = lifetime.as_secs(), "obtained reddit access token");
        Ok(AccessToken {
            value,
            expires_at: Instant::now() + lifetime,
        })
    }

    async fn bearer_token(&self) -> Result<Option<String>> {
        if self.config.credentials.is_none() {
            return Ok(None);
        }
        {
            let guard = self.token.read().await;
            if let Some(token) = guard.as_ref() {
                if token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                    return Ok(Some(token.value.clone()));
                }
            }
        }
        let mut guard = self.token.write().await;
        if let Some(token) = guard.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                return Ok(Some(token.value.clone()));
            }
        }
        let token = self.request_access_token().await?;
        let value = token.value.clone();
        *guard = Some(token);
        Ok(Some(value))
    }

    async fn request_json<T, F>(&self, operation: &str, mut request_builder: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let mut request = request_builder();
            if let Some(token) = self.bearer_token().await? {
                request = request.bearer_auth(token);
            }
            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let hint = RateLimitHint::from_headers(response.headers());
                    if status.is_success() {
                        if hint.is_exhausted() {
                            debug!(
                                operation,
                                reset = ?hint.reset,
                                "reddit rate-limit window exhausted"
                            );
                        }
                        let parsed = response
                            .json::<T>()
                            .await
                            .with_context(|| format!("failed to decode reddit {operation}"))?;
                        return Ok(parsed);
                    }

                    let body = response.text().await.unwrap_or_default();
                    if self.retry.retries_status(attempt, status) {
                        let delay = self.retry.delay(attempt, &hint);
                        debug!(operation, status = status.as_u16(), ?delay, "retrying reddit request");
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    bail!(
                        "reddit api {operation} failed with status {}: {}",
                        status.as_u16(),
                        truncate_for_error(&body, 800)
                    );
                }
                Err(error) => {
                    if self.retry.retries_transport(attempt, &error) {
                        tokio::time::sleep(self.retry.delay(attempt, &RateLimitHint::default()))
                            .await;
                        continue;
                    }
                    return Err(error)
                        .with_context(|| format!("reddit api {operation} request failed"));
                }
            }
        }
    }
}

#[async_trait]
impl ThreadLookup for RedditApiClient {
    async fn fetch_parent(&self, parent_fullname: &str) -> Result<ParentNode> {
        let listing: Value = self
            .request_json("lookup parent", || {
                self.http
                    .get(format!("{}/api/info", self.config.api_base))
                    .query(&[("id", parent_fullname), ("raw_json", "1")])
            })
            .await?;
        parse_info_listing(listing)
            .with_context(|| format!("failed to resolve parent {parent_fullname}"))
    }
}

#[async_trait]
impl ReplyPublisher for RedditApiClient {
    async fn post_reply(&self, parent_fullname: &str, body: &str) -> Result<PostedReply> {
        if body.trim().is_empty() {
            bail!("refusing to post an empty reply to {parent_fullname}");
        }
        // Not retried: a timed-out submit may still have been published.
        let mut request = self
            .http
            .post(format!("{}/api/comment", self.config.api_base))
            .form(&[
                ("api_type", "json"),
                ("thing_id", parent_fullname),
                ("text", body),
            ]);
        if let Some(token) = self.bearer_token().await? {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .context("reddit api submit reply request failed")?;
        let status = response.status();
        let raw = response.text().await.unwrap_or_default();
        if !status.is_success() {
            bail!(
                "reddit api submit reply failed with status {}: {}",
                status.as_u16(),
                truncate_for_error(&raw, 800)
            );
        }
        let parsed = serde_json::from_str::<CommentSubmitResponse>(&raw)
            .context("failed to decode reddit submit reply response")?;
        if !parsed.json.errors.is_empty() {
            let rendered = serde_json::to_string(&parsed.json.errors).unwrap_or_default();
            bail!(
                "reddit rejected reply to {parent_fullname}: {}",
                truncate_for_error(&rendered, 400)
            );
        }
        let posted = parsed
            .json
            .data
            .as_ref()
            .and_then(|data| data.get("things"))
            .and_then(|things| things.get(0))
            .and_then(|thing| thing.get("data"));
        Ok(PostedReply {
            id: posted
                .and_then(|data| data.get("id"))
                .and_then(Value::as_str)
                .map(str::to_string),
            permalink: posted
                .and_then(|data| data.get("permalink"))
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::{RedditApiClient, RedditApiConfig, RedditCredentials};
    use crate::{parse_comment_permalink, ParentNode, ReplyPublisher, ThreadLookup};

    fn config(server: &MockServer, credentials: bool) -> RedditApiConfig {
        RedditApiConfig {
            api_base: server.base_url(),
            auth_base: server.base_url(),
            user_agent: "parley-test/0.1".to_string(),
            credentials: credentials.then(|| RedditCredentials {
                client_id: "cid".to_string(),
                client_secret: "secret".to_string(),
                username: "bot1".to_string(),
                password: "hunter2".to_string(),
            }),
            request_timeout_ms: 3_000,
            retry_max_attempts: 2,
            retry_base_delay_ms: 1,
        }
    }

    fn mock_token(server: &MockServer) -> httpmock::Mock<'_> {
        server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/access_token")
                .header_exists("authorization")
                .body_includes("grant_type=password");
            then.status(200)
                .json_body(json!({ "access_token": "tok-1", "expires_in": 3600 }));
        })
    }

    #[tokio::test]
    async fn integration_authenticate_and_resolve_identity_use_bearer_token() {
        let server = MockServer::start();
        let token = mock_token(&server);
        let me = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v1/me")
                .header("authorization", "Bearer tok-1")
                .header("user-agent", "parley-test/0.1");
            then.status(200).json_body(json!({ "name": "bot1" }));
        });

        let client = RedditApiClient::new(config(&server, true)).expect("client");
        client.authenticate().await.expect("auth");
        let name = client.resolve_identity().await.expect("identity");

        assert_eq!(name, "bot1");
        token.assert_hits(1);
        me.assert();
    }

    #[tokio::test]
    async fn regression_invalid_grant_is_an_authentication_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/access_token");
            then.status(200).json_body(json!({ "error": "invalid_grant" }));
        });

        let client = RedditApiClient::new(config(&server, true)).expect("client");
        let error = client.authenticate().await.expect_err("bad credentials");
        assert!(error.to_string().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn functional_list_new_comments_and_parent_lookup_decode_listings() {
        let server = MockServer::start();
        mock_token(&server);
        server.mock(|when, then| {
            when.method(GET)
                .path("/r/politics/comments")
                .query_param("limit", "100");
            then.status(200).json_body(json!({ "data": { "children": [{
                "kind": "t1",
                "data": { "id": "c2", "author": "u2", "body": "reply", "link_id": "t3_p", "parent_id": "t1_c1" }
            }]}}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/info").query_param("id", "t1_c1");
            then.status(200).json_body(json!({ "data": { "children": [{
                "kind": "t1",
                "data": { "id": "c1", "author": "u1", "body": "root", "link_id": "t3_p", "parent_id": "t3_p" }
            }]}}));
        });

        let client = RedditApiClient::new(config(&server, true)).expect("client");
        let comments = client.list_new_comments("r/politics").await.expect("list");
        assert_eq!(comments.len(), 1);
        let parent = client
            .fetch_parent(&comments[0].parent_id)
            .await
            .expect("parent");
        assert!(matches!(parent, ParentNode::Comment(ref c) if c.body == "root"));
    }

    #[tokio::test]
    async fn functional_post_reply_surfaces_api_errors() {
        let server = MockServer::start();
        mock_token(&server);
        server.mock(|when, then| {
            when.method(POST)
                .path("/api/comment")
                .body_includes("thing_id=t1_bad");
            then.status(200).json_body(json!({ "json": {
                "errors": [["TOO_OLD", "that's a piece of history now", "parent"]]
            }}));
        });
        let ok = server.mock(|when, then| {
            when.method(POST)
                .path("/api/comment")
                .body_includes("thing_id=t1_good");
            then.status(200).json_body(json!({ "json": {
                "errors": [],
                "data": { "things": [{ "kind": "t1", "data": { "id": "r9", "permalink": "/r/x/comments/p/t/r9/" } }] }
            }}));
        });

        let client = RedditApiClient::new(config(&server, true)).expect("client");
        let posted = client.post_reply("t1_good", "hello").await.expect("post");
        ok.assert();
        assert_eq!(posted.id.as_deref(), Some("r9"));

        let error = client
            .post_reply("t1_bad", "hello")
            .await
            .expect_err("api error");
        assert!(error.to_string().contains("TOO_OLD"));
    }

    #[tokio::test]
    async fn integration_anonymous_thread_fetch_skips_token_grant() {
        let server = MockServer::start();
        let token = mock_token(&server);
        let thread = server.mock(|when, then| {
            when.method(GET)
                .path("/r/science/comments/abc/comment/c9.json")
                .query_param("context", "10000");
            then.status(200).json_body(json!([
                { "data": { "children": [{ "kind": "t3", "data": { "id": "abc", "title": "T", "selftext": "", "url": "", "is_self": true } }] } },
                { "data": { "children": [] } }
            ]));
        });

        let client = RedditApiClient::new(config(&server, false)).expect("client");
        let permalink = parse_comment_permalink(
            "https://www.reddit.com/r/science/comments/abc/comment/c9/?utm_source=share",
        )
        .expect("permalink");
        let snapshot = client.fetch_thread(&permalink).await.expect("thread");

        thread.assert();
        token.assert_hits(0);
        assert_eq!(snapshot.submission.title, "T");
        assert!(snapshot.top_level.is_empty());
    }

    #[tokio::test]
    async fn regression_rate_limited_listing_retries_after_window_reset() {
        let server = MockServer::start();
        mock_token(&server);
        let limited = server.mock(|when, then| {
            when.method(GET)
                .path("/r/politics/comments")
                .header("authorization", "Bearer tok-1");
            then.status(429)
                .header("x-ratelimit-remaining", "0.0")
                .header("x-ratelimit-reset", "0")
                .body("too many requests");
        });

        let client = RedditApiClient::new(config(&server, true)).expect("client");
        let error = client
            .list_new_comments("politics")
            .await
            .expect_err("429 persists");
        limited.assert_hits(2);
        assert!(error.to_string().contains("429"));
    }

    #[tokio::test]
    async fn regression_server_errors_are_retried_before_failing() {
        let server = MockServer::start();
        mock_token(&server);
        let failing = server.mock(|when, then| {
            when.method(GET).path("/r/politics/comments");
            then.status(503).body("busy");
        });

        let client = RedditApiClient::new(config(&server, true)).expect("client");
        let error = client
            .list_new_comments("politics")
            .await
            .expect_err("503 persists");
        failing.assert_hits(2);
        assert!(error.to_string().contains("503"));
    }
}
