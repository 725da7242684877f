// crates/server/src/poller.rs
//! The two periodic loops driving the monitor.
//!
//! - The ingest loop tails the log, extracts completed transfers, merges
//!   them into history and pushes an `update` event.
//! - The status loop recomputes live state from the trailing window and
//!   pushes a `status` snapshot every tick, changed or not.
//!
//! Both run for the life of the process. Failures are logged and the loop
//! carries on with the next tick.

use std::sync::Arc;
use std::time::Instant;

use ingest_monitor_core::history::HISTORY_CAP;
use ingest_monitor_core::{CompletionExtractor, MergeOutcome, TailCursor};
use ingest_monitor_types::{StreamEvent, TransferRecord};
use tokio::time::MissedTickBehavior;

use crate::metrics::{record_history_write_failure, record_merge, record_poll};
use crate::state::Monitor;

/// What one ingest tick did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub lines: usize,
    pub completed: usize,
    pub merged: MergeOutcome,
    /// Records still waiting for a successful history write.
    pub pending: usize,
}

/// Ingest-side state: the log cursor, the extractor's lookback and any
/// records whose history write failed.
pub struct IngestLoop {
    monitor: Arc<Monitor>,
    cursor: TailCursor,
    extractor: CompletionExtractor,
    pending: Vec<TransferRecord>,
}

impl IngestLoop {
    pub async fn new(monitor: Arc<Monitor>) -> Self {
        let path = monitor.config.log_path.clone();
        let cursor = if monitor.config.skip_existing {
            TailCursor::at_end(path).await
        } else {
            TailCursor::new(path)
        };
        Self {
            monitor,
            cursor,
            extractor: CompletionExtractor::new(),
            pending: Vec::new(),
        }
    }

    /// One pass: tail, extract, merge, notify.
    pub async fn tick(&mut self) -> TickReport {
        let started = Instant::now();
        let lines = self.cursor.poll().await;

        let completed = if lines.is_empty() {
            Vec::new()
        } else {
            self.extractor.extract(&lines)
        };

        let mut report = TickReport {
            lines: lines.len(),
            completed: completed.len(),
            ..Default::default()
        };

        self.pending.extend(completed.iter().cloned());
        if !self.pending.is_empty() {
            report.merged = self.flush_pending().await;
        }
        report.pending = self.pending.len();

        if !completed.is_empty() {
            let names: Vec<&str> = completed.iter().map(|r| r.filename.as_str()).collect();
            tracing::info!(
                count = completed.len(),
                files = ?names,
                accepted = report.merged.accepted,
                "Completed transfers detected"
            );
            self.monitor.hub.publish(&StreamEvent::update(completed));
        }

        record_poll(report.lines, started.elapsed());
        report
    }

    async fn flush_pending(&mut self) -> MergeOutcome {
        let batch = std::mem::take(&mut self.pending);
        let store = self.monitor.history.clone();

        let joined = tokio::task::spawn_blocking(move || {
            let result = store.merge(batch.clone());
            (result, batch)
        })
        .await;

        match joined {
            Ok((Ok(outcome), _)) => {
                record_merge(outcome.accepted, outcome.discarded);
                outcome
            }
            Ok((Err(e), mut batch)) => {
                record_history_write_failure();
                if batch.len() > HISTORY_CAP {
                    let dropped = batch.len() - HISTORY_CAP;
                    batch.drain(..dropped);
                    tracing::warn!(dropped, "Pending transfers over capacity, dropping oldest");
                }
                tracing::warn!(
                    path = %self.monitor.history.path().display(),
                    error = %e,
                    pending = batch.len(),
                    "History write failed, will retry next tick"
                );
                self.pending = batch;
                MergeOutcome::default()
            }
            Err(e) => {
                record_history_write_failure();
                tracing::error!(error = %e, "History merge task failed");
                MergeOutcome::default()
            }
        }
    }

    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.monitor.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            path = %self.monitor.config.log_path.display(),
            interval_ms = self.monitor.config.poll_interval.as_millis() as u64,
            skip_existing = self.monitor.config.skip_existing,
            "Ingest loop started"
        );

        loop {
            interval.tick().await;
            self.tick().await;
        }
    }
}

pub async fn run_ingest_loop(monitor: Arc<Monitor>) {
    IngestLoop::new(monitor).await.run().await;
}

/// Recompute live state, store it, and push it to every subscriber.
///
/// Returns how many subscribers received the snapshot.
pub async fn status_tick(monitor: &Monitor) -> usize {
    let state = monitor.compute_status().await;
    if monitor.set_status(state.clone()) {
        tracing::debug!(
            filename = state.filename.as_deref().unwrap_or("-"),
            progress = state.progress,
            "Live status changed"
        );
    }
    monitor.hub.publish(&StreamEvent::status(state))
}

pub async fn run_status_loop(monitor: Arc<Monitor>) {
    let mut interval = tokio::time::interval(monitor.config.status_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        interval_ms = monitor.config.status_interval.as_millis() as u64,
        window_lines = monitor.config.window_lines,
        "Status loop started"
    );

    loop {
        interval.tick().await;
        status_tick(&monitor).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MonitorConfig;
    use ingest_monitor_types::MediaType;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::path::Path;
    use tempfile::TempDir;

    fn append(path: &Path, text: &str) {
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    fn monitor_in(dir: &TempDir) -> Arc<Monitor> {
        Monitor::open(MonitorConfig::new(
            dir.path().join("ingest.log"),
            dir.path().join("history.json"),
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn tick_records_and_announces_completions() {
        let dir = TempDir::new().unwrap();
        let monitor = monitor_in(&dir);
        let mut sub = monitor.hub.subscribe();
        let mut ingest = IngestLoop::new(monitor.clone()).await;

        append(
            &monitor.config.log_path,
            "SYNC_START:TV\nShow.S01E01.mkv\n  1.77G 100%   47.56MB/s    0:00:38 (xfr#1, to-chk=0/1)\n",
        );
        let report = ingest.tick().await;

        assert_eq!(report.lines, 3);
        assert_eq!(report.completed, 1);
        assert_eq!(report.merged, MergeOutcome { accepted: 1, discarded: 0 });

        let history = monitor.history.recent(10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].media_type, MediaType::Series);

        match sub.rx.recv().await {
            Some(StreamEvent::Update(batch)) => assert_eq!(batch.completed[0].filename, "Show.S01E01.mkv"),
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn repeated_ticks_do_not_duplicate() {
        let dir = TempDir::new().unwrap();
        let monitor = monitor_in(&dir);
        let mut ingest = IngestLoop::new(monitor.clone()).await;

        append(&monitor.config.log_path, "A.mkv\n1.0G 100% 10.00MB/s 0:00:00\n");
        ingest.tick().await;
        let second = ingest.tick().await;

        assert_eq!(second, TickReport::default());
        assert_eq!(monitor.history.recent(10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn no_update_event_without_completions() {
        let dir = TempDir::new().unwrap();
        let monitor = monitor_in(&dir);
        let mut sub = monitor.hub.subscribe();
        let mut ingest = IngestLoop::new(monitor.clone()).await;

        append(&monitor.config.log_path, "sending incremental file list\n");
        ingest.tick().await;
        assert!(sub.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_write_is_retried() {
        let dir = TempDir::new().unwrap();
        let monitor = monitor_in(&dir);
        let mut ingest = IngestLoop::new(monitor.clone()).await;

        // A directory in place of the history file makes the rename fail.
        let history_dir = dir.path().join("history.json");
        std::fs::remove_file(&history_dir).unwrap();
        std::fs::create_dir(&history_dir).unwrap();

        append(&monitor.config.log_path, "A.mkv\n1.0G 100% 10.00MB/s 0:00:00\n");
        let failed = ingest.tick().await;
        assert_eq!(failed.pending, 1);

        std::fs::remove_dir(&history_dir).unwrap();
        let retried = ingest.tick().await;
        assert_eq!(retried.merged.accepted, 1);
        assert_eq!(retried.pending, 0);
        assert_eq!(monitor.history.recent(10).unwrap()[0].filename, "A.mkv");
    }

    #[tokio::test]
    async fn skip_existing_ignores_backlog() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("ingest.log");
        append(&log, "Old.mkv\n1.0G 100% 10.00MB/s 0:00:00\n");

        let mut config = MonitorConfig::new(&log, dir.path().join("history.json"));
        config.skip_existing = true;
        let monitor = Monitor::open(config).unwrap();
        let mut ingest = IngestLoop::new(monitor.clone()).await;

        assert_eq!(ingest.tick().await.lines, 0);
        append(&log, "New.mkv\n2.0G 100% 10.00MB/s 0:00:00\n");
        ingest.tick().await;

        let names: Vec<_> = monitor.history.recent(10).unwrap().into_iter().map(|r| r.filename).collect();
        assert_eq!(names, vec!["New.mkv"]);
    }

    #[tokio::test]
    async fn status_tick_pushes_snapshot_every_time() {
        let dir = TempDir::new().unwrap();
        let monitor = monitor_in(&dir);
        let mut sub = monitor.hub.subscribe();

        append(
            &monitor.config.log_path,
            "SYNC_START:Movies\nInception.2010.mkv\n3.20G  45%  80.00MB/s  0:02:10\n",
        );
        assert_eq!(status_tick(&monitor).await, 1);
        assert_eq!(status_tick(&monitor).await, 1);

        let first = sub.rx.recv().await.unwrap();
        let second = sub.rx.recv().await.unwrap();
        assert_eq!(first, second);
        match first {
            StreamEvent::Status(state) => {
                assert_eq!(state.filename.as_deref(), Some("Inception.2010.mkv"));
                assert_eq!(state.progress, 45);
            }
            other => panic!("expected status, got {other:?}"),
        }
        assert_eq!(monitor.latest_status().progress, 45);
    }

    #[tokio::test(start_paused = true)]
    async fn status_loop_keeps_ticking() {
        let dir = TempDir::new().unwrap();
        let monitor = monitor_in(&dir);
        let mut sub = monitor.hub.subscribe();

        let handle = tokio::spawn(run_status_loop(monitor.clone()));
        for _ in 0..3 {
            let event = sub.rx.recv().await.unwrap();
            assert_eq!(event.kind(), "status");
        }
        handle.abort();
    }
}
