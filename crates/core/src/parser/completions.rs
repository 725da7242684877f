// crates/core/src/parser/completions.rs
//! Completed-transfer extraction from newly appended lines.
//!
//! Two independent detectors run over each increment:
//!
//! - **per-file**: a `<size> 100% <rate>/s <time>` line completes the file
//!   named a few lines above it. Intermediate progress rewrites in between
//!   do not count toward that distance, and the name carries over from an
//!   earlier increment.
//! - **session summary**: a `sent ... bytes/sec` line closes a run; every
//!   media file of that run which shows transfer evidence becomes a record
//!   carrying the run's aggregate size and rate.
//!
//! Only trigger lines inside the increment fire, so each trigger is reported
//! once. The summary detector looks back across earlier increments through a
//! bounded ring of previously seen lines. The two detectors do not
//! deduplicate against each other; the history store does that.

use std::collections::{HashSet, VecDeque};

use ingest_monitor_types::TransferRecord;

use super::patterns::{
    classify, has_progress_indicator, match_marker, match_media_file, match_progress,
    match_summary, Marker, SummaryLine,
};

/// Previously seen lines kept for backward scans.
pub const LOOKBACK_LINES: usize = 200;

/// How far back from a summary line its run may extend.
pub const SUMMARY_WINDOW: usize = 200;

/// A file counts as transferred if a progress indicator follows within this
/// many lines.
pub const INDICATOR_DISTANCE: usize = 3;

/// Lines above a 100% line searched for its filename, not counting
/// progress lines.
pub const PER_FILE_LOOKBACK: usize = 5;

/// The most recently named file that has not completed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OpenFile {
    name: String,
    /// Non-progress lines seen since the name.
    gap: usize,
}

/// Stateful extractor owned by the ingest loop.
#[derive(Debug)]
pub struct CompletionExtractor {
    lookback: VecDeque<String>,
    capacity: usize,
    /// Label of the session open at the end of the last increment.
    label: Option<String>,
    open_file: Option<OpenFile>,
}

impl Default for CompletionExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionExtractor {
    pub fn new() -> Self {
        Self::with_lookback(LOOKBACK_LINES)
    }

    pub fn with_lookback(capacity: usize) -> Self {
        Self {
            lookback: VecDeque::with_capacity(capacity),
            capacity,
            label: None,
            open_file: None,
        }
    }

    /// Extract completions from `new_lines`, stamped with the current time.
    pub fn extract(&mut self, new_lines: &[String]) -> Vec<TransferRecord> {
        self.extract_at(new_lines, chrono::Utc::now().timestamp_millis())
    }

    /// Extract completions from `new_lines`, stamped with `now_ms`.
    pub fn extract_at(&mut self, new_lines: &[String], now_ms: i64) -> Vec<TransferRecord> {
        if new_lines.is_empty() {
            return Vec::new();
        }

        let mut records = self.per_file(new_lines, now_ms);

        let context: Vec<&str> = self
            .lookback
            .iter()
            .chain(new_lines.iter())
            .map(String::as_str)
            .collect();
        let first_new = self.lookback.len();
        records.extend(session_summaries(&context, first_new, now_ms));

        if !records.is_empty() {
            tracing::debug!(
                count = records.len(),
                files = ?records.iter().map(|r| r.filename.as_str()).collect::<Vec<_>>(),
                "Extracted completed transfers"
            );
        }

        self.remember(new_lines);
        records
    }

    fn per_file(&mut self, lines: &[String], now_ms: i64) -> Vec<TransferRecord> {
        let mut records = Vec::new();

        for line in lines {
            match match_marker(line) {
                Some(Marker::Start(l)) => {
                    self.label = l;
                    self.open_file = None;
                    continue;
                }
                Some(Marker::End) => {
                    self.label = None;
                    self.open_file = None;
                    continue;
                }
                None => {}
            }

            if let Some(progress) = match_progress(line) {
                if progress.is_complete() {
                    if let Some(file) = self.open_file.take() {
                        records.push(record(
                            &file.name,
                            &progress.size,
                            &progress.speed,
                            self.label.clone(),
                            now_ms,
                        ));
                    }
                }
                continue;
            }

            if let Some(name) = match_media_file(line) {
                self.open_file = Some(OpenFile {
                    name: name.to_string(),
                    gap: 0,
                });
                continue;
            }

            if let Some(file) = self.open_file.as_mut() {
                file.gap += 1;
                if file.gap >= PER_FILE_LOOKBACK {
                    self.open_file = None;
                }
            }
        }

        records
    }

    fn remember(&mut self, lines: &[String]) {
        for line in lines {
            if self.lookback.len() == self.capacity {
                self.lookback.pop_front();
            }
            if self.capacity > 0 {
                self.lookback.push_back(line.clone());
            }
        }
    }
}

/// Records for every summary line at or after `first_new` in `context`.
fn session_summaries(context: &[&str], first_new: usize, now_ms: i64) -> Vec<TransferRecord> {
    let mut records = Vec::new();

    for idx in first_new..context.len() {
        let Some(summary) = match_summary(context[idx]) else {
            continue;
        };
        let (start, label) = run_start(context, idx);
        records.extend(run_files(context, start, idx, &summary, label, now_ms));
    }

    records
}

/// First line of the run closed by the summary at `end`, plus its label.
///
/// The run starts after the nearest start marker, end marker, or earlier
/// summary, and never more than [`SUMMARY_WINDOW`] lines back.
fn run_start(context: &[&str], end: usize) -> (usize, Option<String>) {
    let lower = end.saturating_sub(SUMMARY_WINDOW);
    for idx in (lower..end).rev() {
        match match_marker(context[idx]) {
            Some(Marker::Start(label)) => return (idx + 1, label),
            Some(Marker::End) => return (idx + 1, None),
            None => {}
        }
        if match_summary(context[idx]).is_some() {
            return (idx + 1, None);
        }
    }
    (lower, None)
}

fn run_files(
    context: &[&str],
    start: usize,
    end: usize,
    summary: &SummaryLine,
    label: Option<String>,
    now_ms: i64,
) -> Vec<TransferRecord> {
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for idx in start..end {
        let Some(name) = match_media_file(context[idx]) else {
            continue;
        };
        if !transferred(context, idx, end) || !seen.insert(name) {
            continue;
        }
        records.push(record(name, &summary.size, &summary.speed, label.clone(), now_ms));
    }

    records
}

/// Whether the file named at `idx` is followed by transfer evidence before
/// the next file name or the end of the run.
fn transferred(context: &[&str], idx: usize, end: usize) -> bool {
    let upper = (idx + 1 + INDICATOR_DISTANCE).min(end);
    for line in &context[idx + 1..upper] {
        if match_media_file(line).is_some() {
            return false;
        }
        if has_progress_indicator(line) {
            return true;
        }
    }
    false
}

fn record(
    filename: &str,
    size: &str,
    speed: &str,
    session: Option<String>,
    now_ms: i64,
) -> TransferRecord {
    TransferRecord {
        filename: filename.to_string(),
        size: size.to_string(),
        speed: speed.to_string(),
        media_type: classify(filename),
        timestamp: now_ms,
        session,
    }
}
