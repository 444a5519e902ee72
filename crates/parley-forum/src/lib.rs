//! Reddit forum adapters: data types, capability traits and the HTTP client.

mod capabilities;
mod comment_stream;
pub mod listing;
pub mod permalink;
pub mod rate_limit;
mod reddit_api_client;
mod types;

pub use capabilities::{CommentSource, CommentStream, ReplyPublisher, ThreadLookup};
pub use comment_stream::{RedditCommentSource, DEFAULT_POLL_INTERVAL_MS, DEFAULT_SEEN_WINDOW};
pub use permalink::{parse_comment_permalink, PermalinkRef};
pub use reddit_api_client::{
    RedditApiClient, RedditApiConfig, RedditCredentials, DEFAULT_REDDIT_API_BASE,
    DEFAULT_REDDIT_AUTH_BASE, DEFAULT_REDDIT_PUBLIC_BASE, DEFAULT_REDDIT_USER_AGENT,
};
pub use types::{
    fullname, short_id, CommentEvent, ParentNode, PostedReply, Submission, ThreadNode,
    ThreadSnapshot, COMMENT_KIND, SUBMISSION_KIND,
};
