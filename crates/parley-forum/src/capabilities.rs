//! Capability traits the reply pipeline consumes.
//!
//! The runtime only depends on these seams; `RedditApiClient` and
//! `RedditCommentSource` are the production implementations, tests use
//! scripted fakes.

use anyhow::Result;
use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::{CommentEvent, ParentNode, PostedReply};

/// Restartable sequence of live comments; an `Err` item means the transport failed.
pub type CommentStream = BoxStream<'static, Result<CommentEvent>>;

#[async_trait]
/// Opens a live comment feed for one forum.
pub trait CommentSource: Send + Sync {
    async fn subscribe(&self, forum: &str) -> Result<CommentStream>;
}

#[async_trait]
/// Resolves the parent of a comment by fullname.
pub trait ThreadLookup: Send + Sync {
    async fn fetch_parent(&self, parent_fullname: &str) -> Result<ParentNode>;
}

#[async_trait]
/// Publishes a reply beneath an existing comment.
pub trait ReplyPublisher: Send + Sync {
    async fn post_reply(&self, parent_fullname: &str, body: &str) -> Result<PostedReply>;
}
