#![no_main]

use libfuzzer_sys::fuzz_target;
use parley_forum::parse_comment_permalink;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    if let Ok(permalink) = parse_comment_permalink(&raw) {
        assert!(permalink.path.starts_with('/'));
        assert!(permalink.path.contains("/comments/"));
        assert!(permalink.json_path().ends_with(".json"));
    }
});
