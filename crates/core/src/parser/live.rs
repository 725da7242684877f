// crates/core/src/parser/live.rs
//! Live-state extraction from the trailing window of the log.
//!
//! The transfer tool's console output is not a stable grammar, so the
//! extractor is a cascade: an exact structural match first, then
//! progressively wider heuristics. Each matcher is named and carries a
//! [`Tier`], and the first one that produces a state wins. Nothing here
//! fails; the worst case is Idle.
//!
//! Every backward scan is bounded by the window and by the session floor
//! (the line after the most recent start marker or summary).

use ingest_monitor_types::CurrentTransferState;

use super::patterns::{
    is_terminal_summary, match_marker, match_media_file, match_progress, Marker, ProgressLine,
};

/// How far above a progress line the filename is normally printed.
pub const FILENAME_WINDOW: usize = 40;

/// Lines at the end of a marker-less log checked for a finished run.
pub const TRAILING_SUMMARY_LINES: usize = 10;

/// Confidence of a live-state result, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    /// Progress line with its filename printed just above it.
    Exact,
    /// Progress line whose filename was further back in the session.
    Widened,
    /// Progress line with no recoverable filename.
    Partial,
    /// No progress yet; the most recently named file at 0%.
    Fallback,
}

/// A live state together with the matcher that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveMatch {
    pub state: CurrentTransferState,
    pub tier: Tier,
    pub matcher: &'static str,
}

/// Whether the window shows a session in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// An end marker (or, without markers, a trailing summary) closes the log.
    Ended,
    /// A session may be running; nothing before `floor` belongs to it.
    Open {
        floor: usize,
        /// Opened by an explicit start marker rather than inferred.
        marked: bool,
    },
}

/// Decide session activity by scanning backward for the nearest marker.
pub fn session_activity(lines: &[String]) -> Activity {
    for (idx, line) in lines.iter().enumerate().rev() {
        match match_marker(line) {
            Some(Marker::End) => return Activity::Ended,
            Some(Marker::Start(_)) => {
                return Activity::Open {
                    floor: idx + 1,
                    marked: true,
                }
            }
            None => {}
        }
    }

    let trailing = lines.len().saturating_sub(TRAILING_SUMMARY_LINES);
    if lines[trailing..].iter().any(|l| is_terminal_summary(l)) {
        return Activity::Ended;
    }

    let floor = lines
        .iter()
        .rposition(|l| is_terminal_summary(l))
        .map_or(0, |idx| idx + 1);
    Activity::Open {
        floor,
        marked: false,
    }
}

/// Everything a matcher may look at.
struct ScanContext<'a> {
    lines: &'a [String],
    floor: usize,
    marked: bool,
    progress: Option<(usize, ProgressLine)>,
}

impl ScanContext<'_> {
    /// Nearest media basename above `from`, looking back at most `bound` lines
    /// and never past the floor.
    fn file_before(&self, from: usize, bound: usize) -> Option<String> {
        let lower = from.saturating_sub(bound).max(self.floor);
        (lower..from)
            .rev()
            .find_map(|idx| match_media_file(&self.lines[idx]))
            .map(str::to_string)
    }
}

fn latest_progress(lines: &[String], floor: usize) -> Option<(usize, ProgressLine)> {
    (floor..lines.len()).rev().find_map(|idx| {
        let progress = match_progress(&lines[idx])?;
        // A finished final file is history, not the live line.
        if progress.is_complete() && progress.nothing_left {
            return None;
        }
        Some((idx, progress))
    })
}

fn progress_state(progress: &ProgressLine, filename: Option<String>) -> CurrentTransferState {
    CurrentTransferState {
        filename,
        progress: progress.percent,
        speed: Some(progress.speed.clone()),
        time_remaining: Some(progress.time_remaining.clone()),
        size: Some(progress.size.clone()),
    }
}

fn progress_with_nearby_file(ctx: &ScanContext<'_>) -> Option<CurrentTransferState> {
    let (idx, progress) = ctx.progress.as_ref()?;
    let file = ctx.file_before(*idx, FILENAME_WINDOW)?;
    Some(progress_state(progress, Some(file)))
}

fn progress_with_widened_file(ctx: &ScanContext<'_>) -> Option<CurrentTransferState> {
    let (idx, progress) = ctx.progress.as_ref()?;
    let file = ctx.file_before(*idx, *idx)?;
    Some(progress_state(progress, Some(file)))
}

fn progress_without_file(ctx: &ScanContext<'_>) -> Option<CurrentTransferState> {
    let (_, progress) = ctx.progress.as_ref()?;
    Some(progress_state(progress, None))
}

fn last_seen_file(ctx: &ScanContext<'_>) -> Option<CurrentTransferState> {
    if ctx.progress.is_some() || !ctx.marked {
        return None;
    }
    let len = ctx.lines.len();
    let file = ctx.file_before(len, len)?;
    Some(CurrentTransferState {
        filename: Some(file),
        ..CurrentTransferState::idle()
    })
}

struct NamedMatcher {
    name: &'static str,
    tier: Tier,
    run: fn(&ScanContext<'_>) -> Option<CurrentTransferState>,
}

/// The cascade, in fallback order.
const CASCADE: &[NamedMatcher] = &[
    NamedMatcher {
        name: "progress_with_nearby_file",
        tier: Tier::Exact,
        run: progress_with_nearby_file,
    },
    NamedMatcher {
        name: "progress_with_widened_file",
        tier: Tier::Widened,
        run: progress_with_widened_file,
    },
    NamedMatcher {
        name: "progress_without_file",
        tier: Tier::Partial,
        run: progress_without_file,
    },
    NamedMatcher {
        name: "last_seen_file",
        tier: Tier::Fallback,
        run: last_seen_file,
    },
];

/// Run the cascade over `window`; `None` means Idle.
pub fn current_match(window: &[String]) -> Option<LiveMatch> {
    let Activity::Open { floor, marked } = session_activity(window) else {
        return None;
    };

    let ctx = ScanContext {
        lines: window,
        floor,
        marked,
        progress: latest_progress(window, floor),
    };

    CASCADE.iter().find_map(|m| {
        (m.run)(&ctx).map(|state| LiveMatch {
            state,
            tier: m.tier,
            matcher: m.name,
        })
    })
}

/// The live transfer state for `window` (the trailing lines of the log).
pub fn current_state(window: &[String]) -> CurrentTransferState {
    match current_match(window) {
        Some(m) => {
            tracing::trace!(matcher = m.matcher, tier = ?m.tier, "Live state matched");
            m.state
        }
        None => CurrentTransferState::idle(),
    }
}
