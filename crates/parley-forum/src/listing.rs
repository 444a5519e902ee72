//! Decoding of Reddit "Listing"/"Thing" JSON into forum types.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::types::{fullname, COMMENT_KIND, SUBMISSION_KIND};
use crate::{CommentEvent, ParentNode, Submission, ThreadNode, ThreadSnapshot};

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Default, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    body: String,
    link_id: String,
    parent_id: String,
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    replies: Value,
}

#[derive(Debug, Deserialize)]
struct RawSubmission {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    is_self: bool,
}

/// Reddit reports removed accounts with placeholder names instead of omitting them.
fn normalize_author(author: Option<String>) -> Option<String> {
    author
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty() && name != "[deleted]" && name != "[removed]")
}

fn comment_from_raw(raw: RawComment) -> (CommentEvent, Value) {
    let event = CommentEvent {
        fullname: raw
            .name
            .unwrap_or_else(|| fullname(COMMENT_KIND, &raw.id)),
        id: raw.id,
        author: normalize_author(raw.author),
        body: raw.body,
        submission_id: raw.link_id,
        parent_id: raw.parent_id,
        permalink: raw.permalink,
    };
    (event, raw.replies)
}

fn submission_from_raw(raw: RawSubmission) -> Submission {
    Submission {
        fullname: raw
            .name
            .unwrap_or_else(|| fullname(SUBMISSION_KIND, &raw.id)),
        id: raw.id,
        author: normalize_author(raw.author),
        title: raw.title,
        selftext: raw.selftext,
        url: raw.url,
        is_self: raw.is_self,
    }
}

fn decode_comment(data: Value) -> Result<(CommentEvent, Value)> {
    let raw = serde_json::from_value::<RawComment>(data).context("failed to decode comment")?;
    Ok(comment_from_raw(raw))
}

fn decode_submission(data: Value) -> Result<Submission> {
    let raw =
        serde_json::from_value::<RawSubmission>(data).context("failed to decode submission")?;
    Ok(submission_from_raw(raw))
}

/// Decode a comment listing (e.g. `/r/<forum>/comments`), keeping listing order.
pub fn parse_comment_listing(value: Value) -> Result<Vec<CommentEvent>> {
    let listing = serde_json::from_value::<Listing>(value).context("failed to decode listing")?;
    listing
        .data
        .children
        .into_iter()
        .filter(|thing| thing.kind == COMMENT_KIND)
        .map(|thing| decode_comment(thing.data).map(|(event, _)| event))
        .collect()
}

/// Decode an `/api/info` response holding exactly one comment or submission.
pub fn parse_info_listing(value: Value) -> Result<ParentNode> {
    let listing = serde_json::from_value::<Listing>(value).context("failed to decode listing")?;
    let thing = listing
        .data
        .children
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("info listing contained no items"))?;
    match thing.kind.as_str() {
        COMMENT_KIND => Ok(ParentNode::Comment(decode_comment(thing.data)?.0)),
        SUBMISSION_KIND => Ok(ParentNode::Submission(decode_submission(thing.data)?)),
        other => bail!("info listing returned unsupported kind '{other}'"),
    }
}

fn parse_reply_forest(replies: Value) -> Result<Vec<ThreadNode>> {
    // Leaf comments carry `"replies": ""` rather than an empty listing.
    if !replies.is_object() {
        return Ok(Vec::new());
    }
    let listing = serde_json::from_value::<Listing>(replies).context("failed to decode replies")?;
    let mut nodes = Vec::new();
    for thing in listing.data.children {
        if thing.kind != COMMENT_KIND {
            continue;
        }
        let (comment, nested) = decode_comment(thing.data)?;
        nodes.push(ThreadNode {
            comment,
            replies: parse_reply_forest(nested)?,
        });
    }
    Ok(nodes)
}

/// Decode a permalink `.json` payload: `[submission listing, comment listing]`.
pub fn parse_thread_listing(value: Value) -> Result<ThreadSnapshot> {
    let Value::Array(mut parts) = value else {
        bail!("thread payload must be a two-element array");
    };
    if parts.len() < 2 {
        bail!("thread payload must be a two-element array");
    }
    let comments_part = parts.remove(1);
    let post_part = parts.remove(0);

    let post_listing =
        serde_json::from_value::<Listing>(post_part).context("failed to decode post listing")?;
    let post_thing = post_listing
        .data
        .children
        .into_iter()
        .find(|thing| thing.kind == SUBMISSION_KIND)
        .ok_or_else(|| anyhow!("thread payload contained no submission"))?;
    let submission = decode_submission(post_thing.data)?;
    let top_level = parse_reply_forest(comments_part)?;

    Ok(ThreadSnapshot {
        submission,
        top_level,
    })
}
