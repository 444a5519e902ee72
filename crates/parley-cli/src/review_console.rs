//! Terminal front end for the review session.

use std::future::Future;
use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use parley_runtime::{
    PendingReply, PostStatus, RefreshOutcome, ReviewNotice, ReviewSession, ShutdownSummary,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::warn;

const CONSOLE_HELP: &str =
    "commands: a = approve, e <text> = approve edited text, s = skip, r = refresh, q = quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConsoleCommand {
    Approve,
    ApproveEdited(String),
    Skip,
    Refresh,
    Quit,
    Help,
    Unknown(String),
}

pub(crate) fn parse_console_command(line: &str) -> Option<ConsoleCommand> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let (head, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (trimmed, ""),
    };
    Some(match (head.to_ascii_lowercase().as_str(), rest) {
        ("a" | "approve", "") => ConsoleCommand::Approve,
        ("e" | "edit", text) if !text.is_empty() => {
            ConsoleCommand::ApproveEdited(text.to_string())
        }
        ("s" | "skip", "") => ConsoleCommand::Skip,
        ("r" | "refresh", "") => ConsoleCommand::Refresh,
        ("q" | "quit" | "exit", "") => ConsoleCommand::Quit,
        ("h" | "help" | "?", "") => ConsoleCommand::Help,
        _ => ConsoleCommand::Unknown(trimmed.to_string()),
    })
}

pub(crate) fn render_pending(pending: &PendingReply) -> String {
    let author = pending.comment.author.as_deref().unwrap_or("[deleted]");
    let mut lines = vec![
        format!(
            "=== Matched keyword '{}' for comment {} by {} ===",
            pending.matched_keyword, pending.comment.id, author
        ),
        pending.thread_context.clone(),
        "--- Suggested reply ---".to_string(),
        pending.suggested_reply.clone(),
    ];
    if let Some(permalink) = pending.comment.permalink.as_deref() {
        lines.insert(1, format!("https://www.reddit.com{permalink}"));
    }
    lines.push(CONSOLE_HELP.to_string());
    lines.join("\n")
}

pub(crate) fn render_notice(notice: &ReviewNotice) -> String {
    match notice {
        ReviewNotice::Presented(pending) => render_pending(pending),
        ReviewNotice::StreamFailed(message) => format!("Stream failure: {message}"),
        ReviewNotice::PostFinished(outcome) => match &outcome.status {
            PostStatus::Posted { reply_id } => format!(
                "Reply posted to comment {}{}",
                outcome.comment_id,
                reply_id
                    .as_deref()
                    .map(|id| format!(" (reply id {id})"))
                    .unwrap_or_default()
            ),
            PostStatus::PostedUnrecorded { error } => format!(
                "Reply posted to comment {} but it could not be recorded: {error}",
                outcome.comment_id
            ),
            PostStatus::Failed { error } => {
                format!("Failed to post reply to comment {}: {error}", outcome.comment_id)
            }
        },
    }
}

/// Handles one command; returns `false` when the operator asked to quit.
fn apply_command(
    session: &mut ReviewSession,
    command: ConsoleCommand,
    out: &mut dyn Write,
) -> Result<bool> {
    let message = match command {
        ConsoleCommand::Quit => return Ok(false),
        ConsoleCommand::Approve => match session.approve(None) {
            Ok(()) => session.status_line(),
            Err(error) => format!("Cannot approve: {error}"),
        },
        ConsoleCommand::ApproveEdited(text) => match session.approve(Some(text)) {
            Ok(()) => session.status_line(),
            Err(error) => format!("Cannot approve: {error}"),
        },
        ConsoleCommand::Skip => match session.skip() {
            Ok(skipped) => format!(
                "Skipped comment {}. {}",
                skipped.comment.id,
                session.status_line()
            ),
            Err(error) => format!("Cannot skip: {error}"),
        },
        ConsoleCommand::Refresh => match session.refresh() {
            RefreshOutcome::Presented(pending) => render_pending(&pending),
            RefreshOutcome::StillReviewing { comment_id } => {
                format!("Still reviewing comment {comment_id}")
            }
            RefreshOutcome::Empty => session.status_line(),
        },
        ConsoleCommand::Help => CONSOLE_HELP.to_string(),
        ConsoleCommand::Unknown(raw) => format!("Unknown command '{raw}'. {CONSOLE_HELP}"),
    };
    writeln!(out, "{message}").context("failed to write console output")?;
    Ok(true)
}

/// Drives the review session from line-oriented input until quit, EOF or `shutdown`.
pub(crate) async fn run_review_loop<R, S>(
    mut session: ReviewSession,
    tick: Duration,
    input: R,
    shutdown: S,
    out: &mut dyn Write,
) -> Result<ShutdownSummary>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let mut lines = input.lines();
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tokio::pin!(shutdown);
    writeln!(out, "{}", session.status_line()).context("failed to write console output")?;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                writeln!(out, "Shutdown requested").context("failed to write console output")?;
                break;
            }
            _ = interval.tick() => {
                for notice in session.tick().await {
                    writeln!(out, "{}", render_notice(&notice))
                        .context("failed to write console output")?;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read operator input")? else {
                    break;
                };
                let Some(command) = parse_console_command(&line) else {
                    continue;
                };
                if !apply_command(&mut session, command, out)? {
                    break;
                }
            }
        }
    }

    let summary = session.shutdown().await;
    if let Some(outcome) = summary.final_post.as_ref() {
        writeln!(out, "{}", render_notice(&ReviewNotice::PostFinished(outcome.clone())))
            .context("failed to write console output")?;
    }
    writeln!(out, "Discarded {} unreviewed item(s)", summary.discarded)
        .context("failed to write console output")?;
    Ok(summary)
}

pub(crate) async fn run_review_console(
    session: ReviewSession,
    tick: Duration,
) -> Result<ShutdownSummary> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    run_review_loop(session, tick, stdin, interrupt_signal(), &mut stdout).await
}

/// Resolves on Ctrl-C. When the handler cannot be installed it never resolves,
/// leaving `q` and end of input as the only ways out.
async fn interrupt_signal() {
    wait_for_interrupt(tokio::signal::ctrl_c()).await;
}

async fn wait_for_interrupt<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(error) = signal.await {
        warn!(%error, "failed to install ctrl-c handler; use 'q' to quit");
        std::future::pending::<()>().await;
    }
}
