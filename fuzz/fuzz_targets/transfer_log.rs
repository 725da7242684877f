//! Arbitrary log bytes through the whole line pipeline.
//!
//! Must never panic, and sanitized lines must stay inside their bounds.

#![no_main]

use ingest_monitor_core::parser::{current_state, CompletionExtractor};
use ingest_monitor_core::sanitize::MAX_LINE_CHARS;
use ingest_monitor_core::tail::split_complete_lines;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let (lines, consumed) = split_complete_lines(data);
    assert!(consumed <= data.len());

    for line in &lines {
        assert!(line.chars().count() <= MAX_LINE_CHARS);
        assert!(!line.contains(['<', '>', '"', '\'', '&']));
        assert!(!line.chars().any(char::is_control));
    }

    let state = current_state(&lines);
    assert!(state.progress <= 100);

    // Feed in two increments so the lookback path is exercised too.
    let mut extractor = CompletionExtractor::new();
    let mid = lines.len() / 2;
    for chunk in [&lines[..mid], &lines[mid..]] {
        for record in extractor.extract_at(chunk, 0) {
            assert!(!record.filename.is_empty());
            assert!(!record.filename.contains('/'));
        }
    }
});
