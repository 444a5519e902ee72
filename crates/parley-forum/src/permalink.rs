//! Comment permalink parsing for thread scrapes.

use anyhow::{bail, Context, Result};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
/// A Reddit thread path plus the comment the link points at, if any.
pub struct PermalinkRef {
    pub path: String,
    pub target_comment_id: Option<String>,
}

impl PermalinkRef {
    /// Path of the JSON rendering for this thread.
    pub fn json_path(&self) -> String {
        format!("{}.json", self.path.trim_end_matches('/'))
    }
}

/// Parse a share link (`/comments/<post>/comment/<id>/`) or a canonical permalink
/// (`/comments/<post>/<slug>/<id>/`). Query strings are discarded.
pub fn parse_comment_permalink(raw: &str) -> Result<PermalinkRef> {
    let parsed = Url::parse(raw.trim()).with_context(|| format!("invalid thread url '{raw}'"))?;
    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    if host != "reddit.com" && !host.ends_with(".reddit.com") {
        bail!("thread url '{raw}' is not a reddit.com link");
    }

    let segments = parsed
        .path_segments()
        .map(|segments| {
            segments
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let Some(comments_index) = segments.iter().position(|segment| segment == "comments") else {
        bail!("thread url '{raw}' does not point at a comments page");
    };
    if segments.len() <= comments_index + 1 {
        bail!("thread url '{raw}' is missing a post id");
    }

    let tail = &segments[comments_index + 2..];
    let target_comment_id = match tail {
        [marker, id, ..] if marker == "comment" => Some(id.clone()),
        [_slug, id, ..] => Some(id.clone()),
        _ => None,
    };

    Ok(PermalinkRef {
        path: format!("/{}", segments.join("/")),
        target_comment_id,
    })
}
