use anyhow::Result;
use parley_forum::CommentEvent;

use crate::DedupStore;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Why a comment was dropped, or which keyword selected it.
pub enum CommentDisposition {
    SelfAuthored,
    AlreadyHandled,
    NoKeyword,
    Matched(String),
}

/// Lower-case, trim and de-duplicate configured keywords, keeping their order.
pub fn normalize_keywords(raw: &[String]) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::with_capacity(raw.len());
    for keyword in raw {
        let keyword = keyword.trim().to_lowercase();
        if !keyword.is_empty() && !keywords.contains(&keyword) {
            keywords.push(keyword);
        }
    }
    keywords
}

/// First keyword, in configured order, that occurs in the lower-cased body.
pub fn match_keyword<'a>(body: &str, keywords: &'a [String]) -> Option<&'a str> {
    let body = body.to_lowercase();
    keywords
        .iter()
        .map(String::as_str)
        .find(|keyword| body.contains(keyword))
}

pub fn is_self_authored(comment: &CommentEvent, bot_identity: Option<&str>) -> bool {
    match (comment.author.as_deref(), bot_identity) {
        (Some(author), Some(identity)) => author.trim().eq_ignore_ascii_case(identity.trim()),
        _ => false,
    }
}

/// Applies the self, dedup and keyword checks in that order.
pub fn classify_comment(
    comment: &CommentEvent,
    bot_identity: Option<&str>,
    keywords: &[String],
    store: &DedupStore,
) -> Result<CommentDisposition> {
    if is_self_authored(comment, bot_identity) {
        return Ok(CommentDisposition::SelfAuthored);
    }
    if store.has(&comment.id)? {
        return Ok(CommentDisposition::AlreadyHandled);
    }
    Ok(match match_keyword(&comment.body, keywords) {
        Some(keyword) => CommentDisposition::Matched(keyword.to_string()),
        None => CommentDisposition::NoKeyword,
    })
}
