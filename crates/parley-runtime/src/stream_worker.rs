//! Producer task: consumes the live comment stream and queues drafted replies.

use std::sync::Arc;

use anyhow::Result;
use futures_util::StreamExt;
use parley_forum::{CommentEvent, CommentSource, ThreadLookup};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::ancestor_chain::build_upward_chain;
use crate::keyword_filter::{classify_comment, CommentDisposition};
use crate::prompt_modes::compose_generation_prompt;
use crate::{ApprovalSender, DedupStore, PendingReply, ReplyBotConfig, ReplyGenerator};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
/// Counters accumulated over the lifetime of one worker.
pub struct StreamWorkerReport {
    pub events_seen: usize,
    pub self_skips: usize,
    pub duplicate_skips: usize,
    pub keyword_misses: usize,
    pub matches: usize,
    pub event_failures: usize,
    pub reconnects: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Cancelled,
    Interrupted,
    QueueClosed,
}

pub struct StreamWorker {
    config: Arc<ReplyBotConfig>,
    source: Arc<dyn CommentSource>,
    lookup: Arc<dyn ThreadLookup>,
    generator: ReplyGenerator,
    store: Arc<DedupStore>,
    sender: ApprovalSender,
    mode_prompt: String,
}

impl StreamWorker {
    /// Fails when the configured mode does not resolve against the template.
    pub fn new(
        config: Arc<ReplyBotConfig>,
        source: Arc<dyn CommentSource>,
        lookup: Arc<dyn ThreadLookup>,
        generator: ReplyGenerator,
        store: Arc<DedupStore>,
        sender: ApprovalSender,
    ) -> Result<Self> {
        let mode_prompt = config.mode_prompt()?;
        Ok(Self {
            config,
            source,
            lookup,
            generator,
            store,
            sender,
            mode_prompt,
        })
    }

    /// Runs until `cancel` flips to `true` (or its sender is dropped).
    ///
    /// Transport failures are followed by the fixed reconnect delay and a fresh
    /// subscription, indefinitely.
    pub async fn run(self, mut cancel: watch::Receiver<bool>) -> StreamWorkerReport {
        let mut report = StreamWorkerReport::default();
        loop {
            if *cancel.borrow() {
                break;
            }

            match self.source.subscribe(&self.config.forum).await {
                Ok(mut stream) => {
                    info!(forum = %self.config.forum, "comment stream subscribed");
                    let end = loop {
                        tokio::select! {
                            changed = cancel.changed() => {
                                if changed.is_err() || *cancel.borrow() {
                                    break SessionEnd::Cancelled;
                                }
                            }
                            next = stream.next() => match next {
                                Some(Ok(comment)) => {
                                    if !self.handle_event(comment, &mut report).await {
                                        break SessionEnd::QueueClosed;
                                    }
                                }
                                Some(Err(stream_error)) => {
                                    warn!(error = %format!("{stream_error:#}"), "comment stream failed");
                                    break SessionEnd::Interrupted;
                                }
                                None => {
                                    warn!("comment stream ended");
                                    break SessionEnd::Interrupted;
                                }
                            }
                        }
                    };
                    match end {
                        SessionEnd::Cancelled => break,
                        SessionEnd::QueueClosed => {
                            warn!("review queue closed; stopping stream worker");
                            break;
                        }
                        SessionEnd::Interrupted => {}
                    }
                }
                Err(subscribe_error) => {
                    warn!(
                        forum = %self.config.forum,
                        error = %format!("{subscribe_error:#}"),
                        "failed to subscribe to comment stream"
                    );
                }
            }

            report.reconnects += 1;
            info!(
                reconnects = report.reconnects,
                events = report.events_seen,
                matches = report.matches,
                delay_ms = self.config.reconnect_delay.as_millis() as u64,
                "reconnecting comment stream"
            );
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
            }
        }

        info!(
            events = report.events_seen,
            self_skips = report.self_skips,
            duplicate_skips = report.duplicate_skips,
            keyword_misses = report.keyword_misses,
            matches = report.matches,
            failures = report.event_failures,
            reconnects = report.reconnects,
            "stream worker stopped"
        );
        report
    }

    /// Returns `false` once the review side can no longer accept items.
    async fn handle_event(&self, comment: CommentEvent, report: &mut StreamWorkerReport) -> bool {
        report.events_seen += 1;
        let disposition = match classify_comment(
            &comment,
            self.config.bot_identity.as_deref(),
            &self.config.keywords,
            &self.store,
        ) {
            Ok(disposition) => disposition,
            Err(classify_error) => {
                report.event_failures += 1;
                warn!(comment_id = %comment.id, error = %format!("{classify_error:#}"), "failed to classify comment");
                return true;
            }
        };

        let keyword = match disposition {
            CommentDisposition::SelfAuthored => {
                report.self_skips += 1;
                return true;
            }
            CommentDisposition::AlreadyHandled => {
                report.duplicate_skips += 1;
                debug!(comment_id = %comment.id, "skipping already handled comment");
                return true;
            }
            CommentDisposition::NoKeyword => {
                report.keyword_misses += 1;
                return true;
            }
            CommentDisposition::Matched(keyword) => keyword,
        };

        match self.prepare_reply(comment, keyword).await {
            Ok(pending) => {
                report.matches += 1;
                info!(
                    comment_id = %pending.comment.id,
                    keyword = %pending.matched_keyword,
                    "queued reply for review"
                );
                self.sender.submit(pending)
            }
            Err(prepare_error) => {
                report.event_failures += 1;
                warn!(error = %format!("{prepare_error:#}"), "failed to prepare reply");
                true
            }
        }
    }

    pub async fn prepare_reply(&self, comment: CommentEvent, keyword: String) -> Result<PendingReply> {
        let chain = build_upward_chain(self.lookup.as_ref(), &comment).await?;
        let thread_context = chain.render();
        let prompt = compose_generation_prompt(&self.mode_prompt, &thread_context);
        let draft = self.generator.draft_reply(&prompt).await;
        Ok(PendingReply {
            comment,
            matched_keyword: keyword,
            thread_context,
            suggested_reply: draft.text,
            draft_source: draft.source,
        })
    }
}

/// Runs the worker on its own task and reports abnormal termination to the review queue.
pub fn spawn_supervised_worker(
    worker: StreamWorker,
    cancel: watch::Receiver<bool>,
) -> JoinHandle<Option<StreamWorkerReport>> {
    let sender = worker.sender.clone();
    tokio::spawn(async move {
        let inner = tokio::spawn(worker.run(cancel));
        match inner.await {
            Ok(report) => Some(report),
            Err(join_error) => {
                error!(error = %join_error, "stream worker terminated abnormally");
                sender.report_stream_failure(format!("stream worker terminated: {join_error}"));
                None
            }
        }
    })
}
