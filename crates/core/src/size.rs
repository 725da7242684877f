// crates/core/src/size.rs
//! Human-readable size arithmetic.
//!
//! The transfer tool prints sizes like `1.77G` or `812.40M`. Totals are kept
//! in gigabytes with binary scaling; a bare number is already gigabytes.

use std::sync::OnceLock;

use regex_lite::Regex;

fn size_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([\d.]+)([KMGT]?)").expect("valid regex"))
}

/// Convert a size token to gigabytes. Unparseable tokens count as zero.
pub fn parse_size_gb(token: &str) -> f64 {
    let Some(caps) = size_token_re().captures(token) else {
        return 0.0;
    };
    let Ok(value) = caps[1].parse::<f64>() else {
        return 0.0;
    };
    match &caps[2] {
        "K" => value / (1024.0 * 1024.0),
        "M" => value / 1024.0,
        "T" => value * 1024.0,
        _ => value,
    }
}

/// Render a raw byte count the way the transfer tool does with `-h`.
pub fn humanize_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["K", "M", "G", "T"];
    if bytes < 1024 {
        return bytes.to_string();
    }
    let mut value = bytes as f64;
    let mut unit = "";
    for u in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = u;
    }
    format!("{value:.2}{unit}")
}

/// Normalize a size token from a summary line.
///
/// Tokens that already carry a unit pass through; bare byte counts
/// (optionally with thousands separators) are humanized.
pub fn normalize_size_token(token: &str) -> String {
    if token.ends_with(['K', 'M', 'G', 'T']) {
        return token.replace(',', "");
    }
    let digits: String = token.chars().filter(|c| *c != ',').collect();
    match digits.parse::<f64>() {
        Ok(bytes) if bytes >= 0.0 => humanize_bytes(bytes as u64),
        _ => token.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn parse_size_units() {
        assert!(approx(parse_size_gb("1.5G"), 1.5));
        assert!(approx(parse_size_gb("512M"), 0.5));
        assert!(approx(parse_size_gb("1048576K"), 1.0));
        assert!(approx(parse_size_gb("2T"), 2048.0));
        assert!(approx(parse_size_gb("3"), 3.0));
    }

    #[test]
    fn parse_size_garbage_is_zero() {
        assert_eq!(parse_size_gb("unknown"), 0.0);
        assert_eq!(parse_size_gb(""), 0.0);
    }

    #[test]
    fn humanize_matches_tool_output() {
        assert_eq!(humanize_bytes(900), "900");
        assert_eq!(humanize_bytes(1536), "1.50K");
        assert_eq!(humanize_bytes(3_435_973_837), "3.20G");
    }

    #[test]
    fn normalize_keeps_units_and_humanizes_raw_counts() {
        assert_eq!(normalize_size_token("3.20G"), "3.20G");
        assert_eq!(normalize_size_token("3,435,973,837"), "3.20G");
        assert_eq!(normalize_size_token("n/a"), "n/a");
    }
}
