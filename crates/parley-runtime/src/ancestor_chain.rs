//! Reconstruction of the single comment path from a submission to a trigger comment.

use std::collections::HashSet;

use anyhow::{bail, Context, Result};
use parley_forum::{CommentEvent, ParentNode, Submission, ThreadLookup, ThreadNode};

pub const DOWNWARD_DEPTH_LIMIT: usize = 50;
const DELETED_AUTHOR: &str = "[deleted]";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Root submission followed by comments in root-to-leaf order.
pub struct AncestorChain {
    pub submission: Submission,
    pub comments: Vec<CommentEvent>,
}

impl AncestorChain {
    pub fn submission_block(&self) -> String {
        let post = &self.submission;
        let mut block = format!(
            "REDDIT POST:\n{}: {}",
            author_label(post.author.as_deref()),
            post.title
        );
        let body = post.selftext.trim();
        if body.is_empty() {
            block.push_str("\n\n[No submission body]");
        } else {
            block.push_str("\n\n");
            block.push_str(body);
        }
        if let Some(link) = post.external_link() {
            block.push_str("\n\nLink: ");
            block.push_str(link);
        }
        block
    }

    /// Submission block followed by one `<author>: <body>` block per comment.
    pub fn blocks(&self) -> Vec<String> {
        let mut blocks = Vec::with_capacity(self.comments.len() + 1);
        blocks.push(self.submission_block());
        blocks.extend(self.comments.iter().map(comment_block));
        blocks
    }

    pub fn render(&self) -> String {
        self.blocks().join("\n\n")
    }

    /// Scrape transcript layout with a `COMMENT SECTION:` divider.
    pub fn render_transcript(&self) -> String {
        let mut parts = vec![self.submission_block(), "COMMENT SECTION:".to_string()];
        parts.extend(self.comments.iter().map(comment_block));
        parts.join("\n\n")
    }
}

fn author_label(author: Option<&str>) -> &str {
    author.unwrap_or(DELETED_AUTHOR)
}

fn comment_block(comment: &CommentEvent) -> String {
    format!("{}: {}", author_label(comment.author.as_deref()), comment.body)
}

/// Follows `parent_id` links until the submission is reached.
pub async fn build_upward_chain(
    lookup: &dyn ThreadLookup,
    trigger: &CommentEvent,
) -> Result<AncestorChain> {
    let mut ancestors = Vec::new();
    let mut visited = HashSet::from([trigger.fullname.clone()]);
    let mut next_parent = trigger.parent_id.clone();
    let submission = loop {
        if !visited.insert(next_parent.clone()) {
            bail!(
                "comment {} has a cyclic ancestor chain at {next_parent}",
                trigger.id
            );
        }
        let parent = lookup
            .fetch_parent(&next_parent)
            .await
            .with_context(|| format!("failed to walk ancestors of comment {}", trigger.id))?;
        match parent {
            ParentNode::Comment(comment) => {
                next_parent = comment.parent_id.clone();
                ancestors.push(comment);
            }
            ParentNode::Submission(submission) => break submission,
        }
    };
    ancestors.reverse();
    ancestors.push(trigger.clone());
    Ok(AncestorChain {
        submission,
        comments: ancestors,
    })
}

/// Descends one child per level: the target when present, else the first child.
pub fn build_downward_chain(
    submission: Submission,
    top_level: &[ThreadNode],
    target_comment_id: Option<&str>,
) -> AncestorChain {
    let mut comments = Vec::new();
    let mut level = top_level;
    let mut depth = 0_usize;
    while depth < DOWNWARD_DEPTH_LIMIT {
        let chosen = target_comment_id
            .and_then(|target| level.iter().find(|node| node.comment.id == target))
            .or_else(|| level.first());
        let Some(node) = chosen else {
            break;
        };
        comments.push(node.comment.clone());
        if target_comment_id == Some(node.comment.id.as_str()) {
            break;
        }
        level = &node.replies;
        depth += 1;
    }
    AncestorChain {
        submission,
        comments,
    }
}
