#![no_main]

use libfuzzer_sys::fuzz_target;
use parley_forum::listing::{parse_comment_listing, parse_info_listing, parse_thread_listing};
use parley_forum::ParentNode;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };

    if let Ok(comments) = parse_comment_listing(value.clone()) {
        for comment in comments {
            assert_ne!(comment.author.as_deref(), Some("[deleted]"));
        }
    }

    if let Ok(ParentNode::Comment(comment)) = parse_info_listing(value.clone()) {
        assert_ne!(comment.author.as_deref(), Some("[removed]"));
    }

    let _ = parse_thread_listing(value);
});
