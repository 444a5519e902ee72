//! Publishing of approved replies, one at a time.

use std::sync::Arc;

use parley_forum::{CommentEvent, ReplyPublisher};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::DedupStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostStatus {
    Posted { reply_id: Option<String> },
    /// Published, but the dedup log could not be updated.
    PostedUnrecorded { error: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostOutcome {
    pub comment_id: String,
    pub status: PostStatus,
}

impl PostOutcome {
    pub fn is_published(&self) -> bool {
        !matches!(self.status, PostStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("a reply is already being posted")]
    PostInFlight,
}

#[derive(Clone)]
/// Serializes posting behind a single mutex shared by every dispatch.
pub struct Poster {
    publisher: Arc<dyn ReplyPublisher>,
    store: Arc<DedupStore>,
    in_flight: Arc<Mutex<()>>,
}

impl Poster {
    pub fn new(publisher: Arc<dyn ReplyPublisher>, store: Arc<DedupStore>) -> Self {
        Self {
            publisher,
            store,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    /// Spawns a posting task, or refuses when another post holds the lock.
    pub fn try_dispatch(
        &self,
        comment: CommentEvent,
        text: String,
    ) -> Result<JoinHandle<PostOutcome>, DispatchError> {
        let guard = Arc::clone(&self.in_flight)
            .try_lock_owned()
            .map_err(|_| DispatchError::PostInFlight)?;
        let poster = self.clone();
        Ok(tokio::spawn(async move {
            poster.post_locked(guard, comment, text).await
        }))
    }

    async fn post_locked(
        &self,
        _guard: OwnedMutexGuard<()>,
        comment: CommentEvent,
        text: String,
    ) -> PostOutcome {
        let comment_id = comment.id.clone();
        let status = match self.publisher.post_reply(&comment.fullname, &text).await {
            Ok(posted) => match self.record_handled(&comment.id).await {
                Ok(_) => {
                    info!(comment_id = %comment.id, reply_id = ?posted.id, "posted reply");
                    PostStatus::Posted {
                        reply_id: posted.id,
                    }
                }
                Err(record_error) => {
                    error!(
                        comment_id = %comment.id,
                        error = %record_error,
                        "reply posted but dedup log append failed"
                    );
                    PostStatus::PostedUnrecorded {
                        error: format!("{record_error:#}"),
                    }
                }
            },
            Err(post_error) => {
                warn!(comment_id = %comment.id, error = %post_error, "failed to post reply");
                PostStatus::Failed {
                    error: format!("{post_error:#}"),
                }
            }
        };
        PostOutcome { comment_id, status }
    }

    /// File I/O runs on the blocking pool; the posting lock is still held by the caller.
    async fn record_handled(&self, comment_id: &str) -> anyhow::Result<bool> {
        let store = Arc::clone(&self.store);
        let comment_id = comment_id.to_string();
        tokio::task::spawn_blocking(move || store.record(&comment_id)).await?
    }
}
