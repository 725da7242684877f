// crates/core/src/sanitize.rs
//! Line hygiene applied before anything reaches the transfer parser.
//!
//! The log is written by a process we don't control, so every line is
//! cleaned, bounded and screened for smuggled session markers. Downstream
//! code only ever sees the output of [`validate`].

use memchr::memmem;

/// Longest line (in chars) the parser will ever see.
pub const MAX_LINE_CHARS: usize = 2000;

/// Session boundary tokens. A single physical line may carry at most one.
pub const SESSION_START_TOKEN: &str = "SYNC_START";
pub const SESSION_END_TOKEN: &str = "SYNC_END";

/// Strip markup-significant and control characters and bound the length.
///
/// Tabs become single spaces so column-aligned progress output still
/// tokenizes; every other control character is dropped.
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len().min(MAX_LINE_CHARS));
    for c in raw.chars() {
        match c {
            '<' | '>' | '"' | '\'' | '&' => {}
            '\t' => out.push(' '),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }

    let trimmed = out.trim();
    match trimmed.char_indices().nth(MAX_LINE_CHARS) {
        Some((cut, _)) => trimmed[..cut].trim_end().to_string(),
        None => trimmed.to_string(),
    }
}

/// Sanitize, then drop lines carrying more than one session marker.
pub fn validate(raw: &str) -> Option<String> {
    let line = sanitize(raw);
    let markers = marker_count(&line);
    if markers > 1 {
        tracing::warn!(
            markers,
            preview = %line.chars().take(80).collect::<String>(),
            "Dropping log line with multiple session markers"
        );
        return None;
    }
    Some(line)
}

fn marker_count(line: &str) -> usize {
    let bytes = line.as_bytes();
    memmem::find_iter(bytes, SESSION_START_TOKEN).count()
        + memmem::find_iter(bytes, SESSION_END_TOKEN).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_html_special_characters() {
        assert_eq!(sanitize(r#"<b>"Movie" & 'Show'</b>.mkv"#), "bMovie  Show/b.mkv");
    }

    #[test]
    fn strips_control_characters_and_keeps_tabs_as_spaces() {
        assert_eq!(sanitize("a\u{7}b\u{1b}[0mc"), "ab[0mc");
        assert_eq!(sanitize("3.20G\t45%\t80.00MB/s"), "3.20G 45% 80.00MB/s");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(sanitize("   Inception.2010.mkv  \r"), "Inception.2010.mkv");
    }

    #[test]
    fn truncates_to_max_chars() {
        let long = "x".repeat(MAX_LINE_CHARS + 500);
        assert_eq!(sanitize(&long).chars().count(), MAX_LINE_CHARS);
    }

    #[test]
    fn truncation_respects_multibyte_chars() {
        let long = "é".repeat(MAX_LINE_CHARS + 1);
        let out = sanitize(&long);
        assert_eq!(out.chars().count(), MAX_LINE_CHARS);
        assert!(out.chars().all(|c| c == 'é'));
    }

    #[test]
    fn validate_accepts_single_marker() {
        assert_eq!(
            validate("SYNC_START:Movies").as_deref(),
            Some("SYNC_START:Movies")
        );
        assert_eq!(validate("SYNC_END:ok").as_deref(), Some("SYNC_END:ok"));
    }

    #[test]
    fn validate_rejects_multiple_markers() {
        assert!(validate("SYNC_START:Movies SYNC_END:done").is_none());
        assert!(validate("SYNC_START:a SYNC_START:b").is_none());
    }

    #[test]
    fn validate_passes_plain_lines() {
        assert_eq!(
            validate("3.20G  45%  80.00MB/s  0:02:10").as_deref(),
            Some("3.20G  45%  80.00MB/s  0:02:10")
        );
    }
}
