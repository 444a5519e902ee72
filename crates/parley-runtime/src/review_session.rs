//! Operator-side state machine: one current item, approve/skip/refresh, post tracking.

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{ApprovalQueue, DispatchError, PendingReply, PostOutcome, PostStatus, Poster};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Something the operator should be told about after a tick.
pub enum ReviewNotice {
    Presented(PendingReply),
    PostFinished(PostOutcome),
    StreamFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Presented(PendingReply),
    StillReviewing { comment_id: String },
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReviewError {
    #[error("no reply is awaiting review")]
    NothingToReview,
    #[error("the current reply is already being posted")]
    AlreadyPosting,
    #[error("reply text is empty")]
    EmptyReply,
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShutdownSummary {
    pub discarded: usize,
    pub final_post: Option<PostOutcome>,
}

struct PostingTask {
    comment_id: String,
    handle: JoinHandle<PostOutcome>,
}

pub struct ReviewSession {
    queue: ApprovalQueue,
    poster: Poster,
    cancel: watch::Sender<bool>,
    current: Option<PendingReply>,
    posting: Option<PostingTask>,
}

impl ReviewSession {
    pub fn new(queue: ApprovalQueue, poster: Poster, cancel: watch::Sender<bool>) -> Self {
        Self {
            queue,
            poster,
            cancel,
            current: None,
            posting: None,
        }
    }

    pub fn current(&self) -> Option<&PendingReply> {
        self.current.as_ref()
    }

    pub fn is_posting(&self) -> bool {
        self.posting.is_some()
    }

    pub fn buffered_len(&self) -> usize {
        self.queue.buffered_len()
    }

    /// Periodic housekeeping: drain the queue, collect a finished post, present the next item.
    pub async fn tick(&mut self) -> Vec<ReviewNotice> {
        let mut notices = self
            .queue
            .drain()
            .into_iter()
            .map(ReviewNotice::StreamFailed)
            .collect::<Vec<_>>();

        if let Some(outcome) = self.collect_finished_post().await {
            notices.push(ReviewNotice::PostFinished(outcome));
        }

        if self.current.is_none() {
            if let Some(next) = self.queue.next_buffered() {
                self.current = Some(next.clone());
                notices.push(ReviewNotice::Presented(next));
            }
        }
        notices
    }

    async fn collect_finished_post(&mut self) -> Option<PostOutcome> {
        let finished = self
            .posting
            .as_ref()
            .is_some_and(|task| task.handle.is_finished());
        if !finished {
            return None;
        }
        let task = self.posting.take()?;
        let outcome = match task.handle.await {
            Ok(outcome) => outcome,
            Err(join_error) => PostOutcome {
                comment_id: task.comment_id,
                status: PostStatus::Failed {
                    error: format!("posting task failed: {join_error}"),
                },
            },
        };
        // The item leaves review whether or not the post succeeded.
        if self
            .current
            .as_ref()
            .is_some_and(|current| current.comment.id == outcome.comment_id)
        {
            self.current = None;
        }
        Some(outcome)
    }

    /// Posts the current item, using `edited` in place of the suggestion when given.
    pub fn approve(&mut self, edited: Option<String>) -> Result<(), ReviewError> {
        if self.posting.is_some() {
            return Err(ReviewError::Dispatch(DispatchError::PostInFlight));
        }
        let current = self.current.as_ref().ok_or(ReviewError::NothingToReview)?;
        let text = edited
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| current.suggested_reply.trim().to_string());
        if text.is_empty() {
            return Err(ReviewError::EmptyReply);
        }
        let handle = self.poster.try_dispatch(current.comment.clone(), text)?;
        info!(comment_id = %current.comment.id, "approved reply for posting");
        self.posting = Some(PostingTask {
            comment_id: current.comment.id.clone(),
            handle,
        });
        Ok(())
    }

    /// Drops the current item without recording it.
    pub fn skip(&mut self) -> Result<PendingReply, ReviewError> {
        if self.posting.is_some() {
            return Err(ReviewError::AlreadyPosting);
        }
        let skipped = self.current.take().ok_or(ReviewError::NothingToReview)?;
        info!(comment_id = %skipped.comment.id, "skipped reply");
        Ok(skipped)
    }

    pub fn refresh(&mut self) -> RefreshOutcome {
        if let Some(current) = self.current.as_ref() {
            return RefreshOutcome::StillReviewing {
                comment_id: current.comment.id.clone(),
            };
        }
        self.queue.drain();
        match self.queue.next_buffered() {
            Some(next) => {
                self.current = Some(next.clone());
                RefreshOutcome::Presented(next)
            }
            None => RefreshOutcome::Empty,
        }
    }

    pub fn status_line(&self) -> String {
        match (&self.current, &self.posting) {
            (_, Some(task)) => format!("Posting reply to comment {}...", task.comment_id),
            (Some(current), None) => format!(
                "Matched keyword '{}' for comment {}",
                current.matched_keyword, current.comment.id
            ),
            (None, None) => "Waiting for new matches...".to_string(),
        }
    }

    /// Stops the producer and discards everything not yet posted.
    ///
    /// An in-flight post is awaited so its dedup record lands before exit.
    pub async fn shutdown(mut self) -> ShutdownSummary {
        if self.cancel.send(true).is_err() {
            warn!("stream worker already stopped before shutdown");
        }
        let mut summary = ShutdownSummary {
            discarded: self.queue.discard_all(),
            final_post: None,
        };
        if let Some(task) = self.posting.take() {
            summary.final_post = task.handle.await.ok();
            self.current = None;
        }
        if self.current.take().is_some() {
            summary.discarded += 1;
        }
        info!(discarded = summary.discarded, "review session shut down");
        summary
    }
}
