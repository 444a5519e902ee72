//! Polling comment source over `/r/<forum>/comments`.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tracing::debug;

use crate::{CommentEvent, CommentSource, CommentStream, RedditApiClient};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_SEEN_WINDOW: usize = 1_000;

#[derive(Debug, Default)]
/// Bounded memory of comment ids already yielded, oldest evicted first.
struct SeenWindow {
    order: VecDeque<String>,
    ids: HashSet<String>,
    capacity: usize,
}

impl SeenWindow {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            ids: HashSet::new(),
            capacity: capacity.max(1),
        }
    }

    /// Returns `false` when the id was already present.
    fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        self.ids.insert(id.to_string());
        self.order.push_back(id.to_string());
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.ids.remove(&evicted);
            }
        }
        true
    }
}

struct PollState {
    client: RedditApiClient,
    forum: String,
    poll_interval: Duration,
    seen: SeenWindow,
    pending: VecDeque<CommentEvent>,
}

impl PollState {
    /// Queue unseen comments from a newest-first listing, oldest first.
    fn absorb(&mut self, newest_first: Vec<CommentEvent>) {
        for comment in newest_first.into_iter().rev() {
            if self.seen.insert(&comment.id) {
                self.pending.push_back(comment);
            }
        }
    }
}

#[derive(Clone)]
/// Live comment feed built by polling the forum's newest-comments listing.
///
/// Comments already present when a subscription opens are skipped.
pub struct RedditCommentSource {
    client: RedditApiClient,
    poll_interval: Duration,
    seen_window: usize,
}

impl RedditCommentSource {
    pub fn new(client: RedditApiClient, poll_interval: Duration, seen_window: usize) -> Self {
        Self {
            client,
            poll_interval,
            seen_window,
        }
    }
}

#[async_trait]
impl CommentSource for RedditCommentSource {
    async fn subscribe(&self, forum: &str) -> Result<CommentStream> {
        let mut state = PollState {
            client: self.client.clone(),
            forum: forum.to_string(),
            poll_interval: self.poll_interval,
            seen: SeenWindow::new(self.seen_window),
            pending: VecDeque::new(),
        };
        let existing = state.client.list_new_comments(forum).await?;
        debug!(forum, skipped = existing.len(), "primed comment stream");
        for comment in existing.iter().rev() {
            state.seen.insert(&comment.id);
        }

        let stream = stream::unfold(Some(state), |state| async move {
            let mut state = state?;
            loop {
                if let Some(comment) = state.pending.pop_front() {
                    return Some((Ok(comment), Some(state)));
                }
                tokio::time::sleep(state.poll_interval).await;
                match state.client.list_new_comments(&state.forum).await {
                    Ok(listing) => state.absorb(listing),
                    // The stream ends after reporting a transport failure.
                    Err(error) => return Some((Err(error), None)),
                }
            }
        });
        Ok(stream.boxed())
    }
}
