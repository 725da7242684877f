// crates/core/src/tail.rs
//! Incremental reads of the transfer log.
//!
//! [`TailCursor`] remembers a byte offset into the growing log so each poll
//! yields only the lines appended since the previous one. [`read_window`]
//! serves the live-state view, which needs the trailing lines of the whole
//! log regardless of what the cursor has already consumed.
//!
//! Both paths run every line through [`crate::sanitize::validate`].

use std::io;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::TailError;
use crate::sanitize::{validate, MAX_LINE_CHARS};

/// Chunk size for backward reading: 8KB.
const CHUNK_SIZE: u64 = 8 * 1024;

/// An unterminated tail longer than this is emitted as a line anyway.
/// Sanitizing cuts it to [`MAX_LINE_CHARS`].
pub const MAX_PARTIAL_BYTES: usize = MAX_LINE_CHARS * 4;

/// Snapshot of a cursor's offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorPosition {
    /// File size observed on the last poll.
    pub last_known_size: u64,
    /// Offset just past the last complete line handed out.
    pub last_position: u64,
}

/// Tracks a byte offset into the transfer log.
///
/// Owned by the ingest loop; nothing else mutates it.
#[derive(Debug)]
pub struct TailCursor {
    path: PathBuf,
    pos: CursorPosition,
}

impl TailCursor {
    /// Start at offset 0, so the first poll replays the existing log.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pos: CursorPosition::default(),
        }
    }

    /// Start at the current end of the log, skipping existing content.
    ///
    /// A missing log starts at 0.
    pub async fn at_end(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let size = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
        Self {
            path,
            pos: CursorPosition {
                last_known_size: size,
                last_position: size,
            },
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn position(&self) -> CursorPosition {
        self.pos
    }

    /// Return the sanitized lines appended since the last poll.
    ///
    /// Never fails: an unreadable log is logged and treated as "nothing new".
    pub async fn poll(&mut self) -> Vec<String> {
        match self.try_poll().await {
            Ok(lines) => lines,
            Err(e) if e.is_not_found() => {
                tracing::debug!(path = %self.path.display(), "Transfer log not present yet");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Transfer log unreadable, skipping poll");
                Vec::new()
            }
        }
    }

    /// Like [`poll`](Self::poll) but surfaces the IO failure.
    ///
    /// - size below the last known size: rotation or truncation. The cursor
    ///   resets to `{0, size}` and nothing is returned this tick; the new
    ///   content is read from the start on the next poll.
    /// - size beyond the last position: reads the new bytes and advances past
    ///   the last complete line. A trailing partial line stays unread until
    ///   its terminator arrives, unless it outgrows [`MAX_PARTIAL_BYTES`].
    pub async fn try_poll(&mut self) -> Result<Vec<String>, TailError> {
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| TailError::io(&self.path, e))?;
        let size = metadata.len();

        if size < self.pos.last_known_size {
            tracing::info!(
                path = %self.path.display(),
                old_size = self.pos.last_known_size,
                new_size = size,
                "Transfer log shrank, assuming rotation and resetting cursor"
            );
            self.pos = CursorPosition {
                last_known_size: size,
                last_position: 0,
            };
            return Ok(Vec::new());
        }

        if size <= self.pos.last_position {
            self.pos.last_known_size = size;
            return Ok(Vec::new());
        }

        let mut file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| TailError::io(&self.path, e))?;
        file.seek(io::SeekFrom::Start(self.pos.last_position))
            .await
            .map_err(|e| TailError::io(&self.path, e))?;

        let want = size - self.pos.last_position;
        let mut buf = Vec::with_capacity(want as usize);
        file.take(want)
            .read_to_end(&mut buf)
            .await
            .map_err(|e| TailError::io(&self.path, e))?;

        let (mut lines, mut consumed) = split_complete_lines(&buf);
        let partial = buf.len() - consumed;
        if partial > MAX_PARTIAL_BYTES {
            tracing::warn!(
                path = %self.path.display(),
                bytes = partial,
                "Unterminated line too long, consuming it as is"
            );
            push_line(&mut lines, &buf[consumed..]);
            consumed = buf.len();
        }
        self.pos.last_position += consumed as u64;
        self.pos.last_known_size = size;

        Ok(lines)
    }
}

/// Split a byte buffer into validated lines.
///
/// `\n` and bare `\r` both terminate a line (the transfer tool rewrites its
/// progress line with `\r`). Returns the lines and the number of bytes up to
/// and including the last terminator; anything after it is incomplete.
pub fn split_complete_lines(bytes: &[u8]) -> (Vec<String>, usize) {
    let mut lines = Vec::new();
    let mut start = 0usize;

    for end in memchr::memchr2_iter(b'\n', b'\r', bytes) {
        push_line(&mut lines, &bytes[start..end]);
        start = end + 1;
    }

    (lines, start)
}

fn push_line(lines: &mut Vec<String>, raw: &[u8]) {
    if raw.is_empty() {
        return;
    }
    let text = String::from_utf8_lossy(raw);
    if let Some(line) = validate(&text) {
        if !line.is_empty() {
            lines.push(line);
        }
    }
}

/// Read the last `n` raw lines from a file without loading the entire file.
///
/// Reads backwards from EOF in 8KB chunks until `n + 1` newlines have been
/// seen (the extra one delimits the oldest wanted line). Lines come back
/// oldest first; a trailing newline does not produce an empty last line.
pub async fn tail_lines(path: &Path, n: usize) -> io::Result<Vec<String>> {
    if n == 0 {
        return Ok(Vec::new());
    }

    let mut file = tokio::fs::File::open(path).await?;
    let file_len = file.metadata().await?.len();
    if file_len == 0 {
        return Ok(Vec::new());
    }

    let mut collected: Vec<u8> = Vec::new();
    let mut remaining = file_len;
    let mut newline_count = 0usize;

    while remaining > 0 {
        let chunk_len = remaining.min(CHUNK_SIZE);
        let offset = remaining - chunk_len;

        file.seek(io::SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; chunk_len as usize];
        file.read_exact(&mut buf).await?;

        newline_count += memchr::memchr_iter(b'\n', &buf).count();

        buf.append(&mut collected);
        collected = buf;
        remaining = offset;

        if newline_count > n {
            break;
        }
    }

    let text = String::from_utf8_lossy(&collected);
    let text = text.as_ref();
    let text = text.strip_suffix('\n').unwrap_or(text);
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let all: Vec<&str> = text.split('\n').collect();
    let start = all.len().saturating_sub(n);
    Ok(all[start..].iter().map(|s| s.to_string()).collect())
}

/// The trailing `n` validated lines of the log, oldest first.
///
/// An unreadable or missing log yields an empty window.
pub async fn read_window(path: &Path, n: usize) -> Vec<String> {
    let raw = match tail_lines(path, n).await {
        Ok(lines) => lines,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Live window unavailable");
            return Vec::new();
        }
    };

    let mut lines = Vec::with_capacity(raw.len());
    for physical in &raw {
        for segment in physical.split('\r') {
            push_line(&mut lines, segment.as_bytes());
        }
    }

    let start = lines.len().saturating_sub(n);
    lines.split_off(start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn append(path: &Path, text: &str) {
        let mut f = std::fs::OpenOptions::new().append(true).open(path).unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn poll_empty_file_yields_nothing() {
        let tmp = NamedTempFile::new().unwrap();
        let mut cursor = TailCursor::new(tmp.path());

        assert!(cursor.poll().await.is_empty());
        assert_eq!(cursor.position(), CursorPosition::default());
    }

    #[tokio::test]
    async fn poll_missing_file_fails_soft() {
        let dir = tempfile::tempdir().unwrap();
        let mut cursor = TailCursor::new(dir.path().join("absent.log"));

        assert!(cursor.poll().await.is_empty());
        assert!(cursor.try_poll().await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn poll_twice_without_growth_is_idempotent() {
        let tmp = NamedTempFile::new().unwrap();
        append(tmp.path(), "SYNC_START:Movies\nInception.2010.mkv\n");
        let mut cursor = TailCursor::new(tmp.path());

        assert_eq!(cursor.poll().await.len(), 2);
        assert!(cursor.poll().await.is_empty());
        assert!(cursor.poll().await.is_empty());
    }

    #[tokio::test]
    async fn oversized_partial_line_is_forced_out() {
        let tmp = NamedTempFile::new().unwrap();
        append(tmp.path(), &"x".repeat(MAX_PARTIAL_BYTES + 10));
        let mut cursor = TailCursor::new(tmp.path());

        let lines = cursor.poll().await;
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].chars().count(), MAX_LINE_CHARS);
        assert_eq!(cursor.position().last_position, (MAX_PARTIAL_BYTES + 10) as u64);

        append(tmp.path(), "\nnext\n");
        assert_eq!(cursor.poll().await, vec!["next"]);
    }

    #[tokio::test]
    async fn short_partial_line_waits_for_terminator() {
        let tmp = NamedTempFile::new().unwrap();
        append(tmp.path(), "done\nhalf");
        let mut cursor = TailCursor::new(tmp.path());

        assert_eq!(cursor.poll().await, vec!["done"]);
        assert_eq!(cursor.position().last_position, 5);
        append(tmp.path(), " line\n");
        assert_eq!(cursor.poll().await, vec!["half line"]);
    }

    #[tokio::test]
    async fn poll_yields_only_appended_lines() {
        let tmp = NamedTempFile::new().unwrap();
        append(tmp.path(), "line1\nline2\n");
        let mut cursor = TailCursor::new(tmp.path());

        assert_eq!(cursor.poll().await, vec!["line1", "line2"]);
        append(tmp.path(), "line3\nline4\n");
        assert_eq!(cursor.poll().await, vec!["line3", "line4"]);
    }

    #[tokio::test]
    async fn every_line_delivered_exactly_once_across_polls() {
        let tmp = NamedTempFile::new().unwrap();
        let mut cursor = TailCursor::new(tmp.path());
        let chunks = ["a1\na2\n", "a3", "-tail\na4\n", "", "a5\na6\na7\n"];

        let mut delivered = Vec::new();
        let mut last = 0;
        for chunk in chunks {
            append(tmp.path(), chunk);
            delivered.extend(cursor.poll().await);
            let pos = cursor.position().last_position;
            assert!(pos >= last, "cursor moved backwards");
            last = pos;
        }

        let content = std::fs::read_to_string(tmp.path()).unwrap();
        let expected: Vec<String> = content.lines().map(str::to_string).collect();
        assert_eq!(delivered, expected);
    }

    #[tokio::test]
    async fn partial_line_is_held_back() {
        let tmp = NamedTempFile::new().unwrap();
        append(tmp.path(), "partial-line");
        let mut cursor = TailCursor::new(tmp.path());

        assert!(cursor.poll().await.is_empty());
        assert_eq!(cursor.position().last_position, 0);
        assert_eq!(cursor.position().last_known_size, 12);

        append(tmp.path(), " continued\n");
        assert_eq!(cursor.poll().await, vec!["partial-line continued"]);
    }

    #[tokio::test]
    async fn carriage_returns_split_progress_updates() {
        let tmp = NamedTempFile::new().unwrap();
        append(
            tmp.path(),
            "Inception.2010.mkv\n  1.00G  30%  80.00MB/s  0:00:30\r  2.00G  60%  80.00MB/s  0:00:15\r\n",
        );
        let mut cursor = TailCursor::new(tmp.path());

        assert_eq!(
            cursor.poll().await,
            vec![
                "Inception.2010.mkv",
                "1.00G  30%  80.00MB/s  0:00:30",
                "2.00G  60%  80.00MB/s  0:00:15",
            ]
        );
    }

    #[tokio::test]
    async fn hostile_lines_are_dropped_not_fatal() {
        let tmp = NamedTempFile::new().unwrap();
        append(tmp.path(), "ok1\nSYNC_START:x SYNC_END:y\nok2\n");
        let mut cursor = TailCursor::new(tmp.path());

        assert_eq!(cursor.poll().await, vec!["ok1", "ok2"]);
    }

    #[tokio::test]
    async fn shrink_resets_cursor_and_skips_one_tick() {
        let tmp = NamedTempFile::new().unwrap();
        let long_line = format!("{}\n", "x".repeat(99));
        append(tmp.path(), &long_line.repeat(50)); // 5000 bytes
        let mut cursor = TailCursor::new(tmp.path());
        assert_eq!(cursor.poll().await.len(), 50);
        assert_eq!(cursor.position().last_position, 5000);

        {
            let mut f = std::fs::File::create(tmp.path()).unwrap(); // truncates
            f.write_all(long_line.repeat(2).as_bytes()).unwrap(); // 200 bytes
        }

        assert!(cursor.poll().await.is_empty());
        assert_eq!(
            cursor.position(),
            CursorPosition {
                last_position: 0,
                last_known_size: 200,
            }
        );

        // Realigned: the new epoch is read on the following tick.
        assert_eq!(cursor.poll().await.len(), 2);
        assert_eq!(cursor.position().last_position, 200);
    }

    #[tokio::test]
    async fn at_end_skips_existing_content() {
        let tmp = NamedTempFile::new().unwrap();
        append(tmp.path(), "existing1\nexisting2\n");

        let mut cursor = TailCursor::at_end(tmp.path()).await;
        assert!(cursor.poll().await.is_empty());

        append(tmp.path(), "new1\n");
        assert_eq!(cursor.poll().await, vec!["new1"]);
    }

    #[tokio::test]
    async fn tail_last_5() {
        let mut f = NamedTempFile::new().unwrap();
        for i in 0..1000 {
            writeln!(f, "line{}", i).unwrap();
        }
        f.flush().unwrap();

        let result = tail_lines(f.path(), 5).await.unwrap();
        assert_eq!(
            result,
            vec!["line995", "line996", "line997", "line998", "line999"]
        );
    }

    #[tokio::test]
    async fn tail_large_lines_and_no_trailing_newline() {
        let mut f = NamedTempFile::new().unwrap();
        let big_a = "A".repeat(10_000);
        let big_b = "B".repeat(12_000);
        write!(f, "{}\n{}\nshort", big_a, big_b).unwrap();
        f.flush().unwrap();

        let result = tail_lines(f.path(), 2).await.unwrap();
        assert_eq!(result, vec![big_b, "short".to_string()]);
    }

    #[tokio::test]
    async fn tail_zero_and_empty() {
        let f = NamedTempFile::new().unwrap();
        assert!(tail_lines(f.path(), 0).await.unwrap().is_empty());
        assert!(tail_lines(f.path(), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn window_is_sanitized_and_bounded() {
        let tmp = NamedTempFile::new().unwrap();
        append(
            tmp.path(),
            "old\n<b>Movie.mkv</b>\n1.0G 10% 1.00MB/s 0:00:01\r1.0G 20% 1.00MB/s 0:00:01\n",
        );

        let window = read_window(tmp.path(), 3).await;
        assert_eq!(
            window,
            vec![
                "bMovie.mkv/b",
                "1.0G 10% 1.00MB/s 0:00:01",
                "1.0G 20% 1.00MB/s 0:00:01",
            ]
        );
    }

    #[tokio::test]
    async fn window_of_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_window(&dir.path().join("nope.log"), 10).await.is_empty());
    }
}
