use std::collections::VecDeque;

use parley_forum::CommentEvent;
use tokio::sync::mpsc;

use crate::DraftSource;

#[derive(Debug, Clone, PartialEq, Eq)]
/// A matched comment with its drafted reply, waiting for operator review.
pub struct PendingReply {
    pub comment: CommentEvent,
    pub matched_keyword: String,
    pub thread_context: String,
    pub suggested_reply: String,
    pub draft_source: DraftSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewItem {
    Pending(PendingReply),
    /// The stream worker stopped unexpectedly.
    StreamFailed { message: String },
}

#[derive(Debug, Clone)]
/// Producer handle; cheap to clone.
pub struct ApprovalSender {
    tx: mpsc::UnboundedSender<ReviewItem>,
}

impl ApprovalSender {
    /// Returns `false` once the review side has gone away.
    pub fn submit(&self, pending: PendingReply) -> bool {
        self.tx.send(ReviewItem::Pending(pending)).is_ok()
    }

    pub fn report_stream_failure(&self, message: impl Into<String>) -> bool {
        self.tx
            .send(ReviewItem::StreamFailed {
                message: message.into(),
            })
            .is_ok()
    }
}

#[derive(Debug)]
/// Consumer side owned by the review loop: channel receiver plus a local FIFO buffer.
pub struct ApprovalQueue {
    rx: mpsc::UnboundedReceiver<ReviewItem>,
    buffered: VecDeque<PendingReply>,
}

pub fn approval_channel() -> (ApprovalSender, ApprovalQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ApprovalSender { tx },
        ApprovalQueue {
            rx,
            buffered: VecDeque::new(),
        },
    )
}

impl ApprovalQueue {
    /// Moves every available item into the buffer; returns stream-failure messages.
    pub fn drain(&mut self) -> Vec<String> {
        let mut failures = Vec::new();
        while let Ok(item) = self.rx.try_recv() {
            match item {
                ReviewItem::Pending(pending) => self.buffered.push_back(pending),
                ReviewItem::StreamFailed { message } => failures.push(message),
            }
        }
        failures
    }

    pub fn next_buffered(&mut self) -> Option<PendingReply> {
        self.buffered.pop_front()
    }

    pub fn buffered_len(&self) -> usize {
        self.buffered.len()
    }

    /// Drops everything buffered or still in the channel.
    pub fn discard_all(&mut self) -> usize {
        self.drain();
        let discarded = self.buffered.len();
        self.buffered.clear();
        self.rx.close();
        discarded
    }
}
