// crates/core/src/parser/patterns.rs
//! Matching primitives shared by the live-state and completion paths.
//!
//! Each pattern compiles once on first use. Matchers take a single
//! sanitized line and never look at neighbours; windowing is the caller's
//! job.

use std::sync::OnceLock;

use ingest_monitor_types::MediaType;
use regex_lite::Regex;

use crate::sanitize::{SESSION_END_TOKEN, SESSION_START_TOKEN};
use crate::size::normalize_size_token;

/// Extensions the transfer job copies.
pub const MEDIA_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "m4v", "webm"];

/// Text the ingest wrapper prints once a whole job has finished.
const COMPLETE_SENTINEL: &str = "ingest complete";

fn progress_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([\d.]+[KMGT]?)\s+(\d{1,3})%\s+([\d.]+[KMGT]?B/s)\s+(\d+:\d{2}:\d{2})")
            .expect("valid progress regex")
    })
}

fn summary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"sent\s+([\d.,]+[KMGT]?)\s+bytes\b.*?([\d.,]+[KMGT]?)\s+bytes/sec")
            .expect("valid summary regex")
    })
}

fn series_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)S\d{1,2}E\d{1,3}|Season|Episode").expect("valid series regex")
    })
}

/// One `<size> <pct>% <rate>/s <H:MM:SS>` progress line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressLine {
    pub size: String,
    pub percent: u8,
    pub speed: String,
    pub time_remaining: String,
    /// The tool reported nothing left to check after this file.
    pub nothing_left: bool,
}

impl ProgressLine {
    pub fn is_complete(&self) -> bool {
        self.percent >= 100
    }
}

pub fn match_progress(line: &str) -> Option<ProgressLine> {
    let caps = progress_re().captures(line)?;
    let percent: u16 = caps[2].parse().ok()?;
    Some(ProgressLine {
        size: caps[1].to_string(),
        percent: percent.min(100) as u8,
        speed: caps[3].to_string(),
        time_remaining: caps[4].to_string(),
        nothing_left: has_nothing_left_sentinel(line),
    })
}

/// Aggregate `sent <bytes> bytes ... <rate> bytes/sec` line closing a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryLine {
    pub size: String,
    pub speed: String,
}

pub fn match_summary(line: &str) -> Option<SummaryLine> {
    let caps = summary_re().captures(line)?;
    Some(SummaryLine {
        size: normalize_size_token(&caps[1]),
        speed: format!("{}/s", normalize_size_token(&caps[2])),
    })
}

/// Completion sentinel or an aggregate summary line.
pub fn is_terminal_summary(line: &str) -> bool {
    line.to_ascii_lowercase().contains(COMPLETE_SENTINEL) || summary_re().is_match(line)
}

fn has_nothing_left_sentinel(line: &str) -> bool {
    line.contains("to-chk=0/") || line.contains("to-check=0/")
}

/// A `%` or a transfer counter, i.e. evidence that bytes actually moved.
pub fn has_progress_indicator(line: &str) -> bool {
    line.contains('%') || line.contains("xfr#") || line.contains("ir-chk")
}

/// Session boundary markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Start(Option<String>),
    End,
}

pub fn match_marker(line: &str) -> Option<Marker> {
    if let Some(idx) = line.find(SESSION_START_TOKEN) {
        let rest = &line[idx + SESSION_START_TOKEN.len()..];
        let label = rest
            .strip_prefix(':')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string);
        return Some(Marker::Start(label));
    }
    if line.contains(SESSION_END_TOKEN) {
        return Some(Marker::End);
    }
    None
}

/// Basename of a line naming a media file, if it does.
pub fn match_media_file(line: &str) -> Option<&str> {
    let (_, ext) = line.rsplit_once('.')?;
    if !MEDIA_EXTENSIONS
        .iter()
        .any(|known| ext.eq_ignore_ascii_case(known))
    {
        return None;
    }
    let name = line.rsplit('/').next().unwrap_or(line).trim();
    (!name.is_empty()).then_some(name)
}

pub fn classify(filename: &str) -> MediaType {
    if series_re().is_match(filename) {
        MediaType::Series
    } else {
        MediaType::Movie
    }
}
