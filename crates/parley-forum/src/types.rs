use serde::{Deserialize, Serialize};

pub const COMMENT_KIND: &str = "t1";
pub const SUBMISSION_KIND: &str = "t3";

/// Build a `<kind>_<id>` fullname, leaving already-prefixed ids untouched.
pub fn fullname(kind: &str, id: &str) -> String {
    let prefix = format!("{kind}_");
    if id.starts_with(&prefix) {
        id.to_string()
    } else {
        format!("{prefix}{id}")
    }
}

/// Strip a `t1_`/`t3_` style prefix from a fullname.
pub fn short_id(fullname: &str) -> &str {
    match fullname.split_once('_') {
        Some((kind, id)) if kind.len() == 2 && kind.starts_with('t') => id,
        _ => fullname,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A comment observed on the live stream or fetched while walking a thread.
pub struct CommentEvent {
    pub id: String,
    pub fullname: String,
    /// `None` when the author account was deleted or removed.
    pub author: Option<String>,
    pub body: String,
    /// Fullname of the root submission (`t3_...`).
    pub submission_id: String,
    /// Fullname of the parent: a comment (`t1_...`) or the submission itself.
    pub parent_id: String,
    #[serde(default)]
    pub permalink: Option<String>,
}

impl CommentEvent {
    pub fn parent_is_submission(&self) -> bool {
        self.parent_id.starts_with("t3_")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// The root post a comment tree hangs from.
pub struct Submission {
    pub id: String,
    pub fullname: String,
    pub author: Option<String>,
    pub title: String,
    pub selftext: String,
    pub url: String,
    pub is_self: bool,
}

impl Submission {
    /// External link for link posts; self posts and Reddit comment pages yield `None`.
    pub fn external_link(&self) -> Option<&str> {
        let url = self.url.trim();
        if self.is_self || url.is_empty() || url.contains("/comments/") {
            return None;
        }
        Some(url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of a parent lookup.
pub enum ParentNode {
    Comment(CommentEvent),
    Submission(Submission),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A comment together with the replies fetched alongside it.
pub struct ThreadNode {
    pub comment: CommentEvent,
    pub replies: Vec<ThreadNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A submission and its top-level comment forest as returned by a permalink fetch.
pub struct ThreadSnapshot {
    pub submission: Submission,
    pub top_level: Vec<ThreadNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
/// Identifiers of a freshly published reply, when the platform reports them.
pub struct PostedReply {
    pub id: Option<String>,
    pub permalink: Option<String>,
}
