// crates/server/src/state.rs
//! Shared state for the poll loops and the HTTP handlers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ingest_monitor_core::{current_state, read_window, HistoryError, HistoryStore};
use ingest_monitor_types::CurrentTransferState;
use tokio::sync::watch;

use crate::config::Args;
use crate::hub::BroadcastHub;

/// Everything the monitor needs to know, resolved from [`Args`].
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub log_path: PathBuf,
    pub history_path: PathBuf,
    pub device_status_path: PathBuf,
    pub poll_interval: Duration,
    pub status_interval: Duration,
    pub window_lines: usize,
    pub process_name: String,
    pub skip_existing: bool,
}

impl MonitorConfig {
    /// Defaults for everything but the two files.
    pub fn new(log_path: impl Into<PathBuf>, history_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
            history_path: history_path.into(),
            device_status_path: PathBuf::from(crate::config::DEFAULT_DEVICE_STATUS_PATH),
            poll_interval: Duration::from_millis(1000),
            status_interval: Duration::from_millis(500),
            window_lines: 500,
            process_name: "rsync".to_string(),
            skip_existing: false,
        }
    }
}

impl From<&Args> for MonitorConfig {
    fn from(args: &Args) -> Self {
        Self {
            log_path: args.log_path.clone(),
            history_path: args.history_path.clone(),
            device_status_path: args.device_status_path.clone(),
            poll_interval: args.poll_interval(),
            status_interval: args.status_interval(),
            window_lines: args.window_lines,
            process_name: args.process_name.clone(),
            skip_existing: args.skip_existing,
        }
    }
}

/// The monitoring engine's owned state.
///
/// Only the ingest loop advances the log cursor; it owns that privately.
/// What lives here is shared read access plus the push hub.
#[derive(Debug)]
pub struct Monitor {
    pub config: MonitorConfig,
    pub history: HistoryStore,
    pub hub: Arc<BroadcastHub>,
    status: watch::Sender<CurrentTransferState>,
}

impl Monitor {
    /// Open the history store (creating it if needed) and build the monitor.
    pub fn open(config: MonitorConfig) -> Result<Arc<Self>, HistoryError> {
        let history = HistoryStore::open(&config.history_path)?;
        let (status, _) = watch::channel(CurrentTransferState::idle());
        Ok(Arc::new(Self {
            config,
            history,
            hub: Arc::new(BroadcastHub::new()),
            status,
        }))
    }

    /// Recompute live state from the trailing window of the log.
    pub async fn compute_status(&self) -> CurrentTransferState {
        let window = read_window(&self.config.log_path, self.config.window_lines).await;
        current_state(&window)
    }

    /// Most recent snapshot stored by the status loop.
    ///
    /// Idle until the loop's first tick.
    pub fn latest_status(&self) -> CurrentTransferState {
        self.status.borrow().clone()
    }

    /// Store a new snapshot. Returns whether it differs from the previous one.
    pub(crate) fn set_status(&self, state: CurrentTransferState) -> bool {
        let previous = self.status.send_replace(state);
        previous != *self.status.borrow()
    }
}

/// State handed to every route handler.
#[derive(Debug)]
pub struct AppState {
    pub start_time: Instant,
    pub monitor: Arc<Monitor>,
}

impl AppState {
    pub fn new(monitor: Arc<Monitor>) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            monitor,
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn open_creates_history_and_starts_idle() {
        let dir = TempDir::new().unwrap();
        let config = MonitorConfig::new(dir.path().join("ingest.log"), dir.path().join("history.json"));
        let monitor = Monitor::open(config).unwrap();

        assert!(dir.path().join("history.json").exists());
        assert_eq!(monitor.latest_status(), CurrentTransferState::idle());
        assert_eq!(monitor.compute_status().await, CurrentTransferState::idle());
    }

    #[tokio::test]
    async fn set_status_reports_changes() {
        let dir = TempDir::new().unwrap();
        let config = MonitorConfig::new(dir.path().join("ingest.log"), dir.path().join("history.json"));
        let monitor = Monitor::open(config).unwrap();

        let busy = CurrentTransferState {
            filename: Some("A.mkv".into()),
            progress: 10,
            ..Default::default()
        };
        assert!(monitor.set_status(busy.clone()));
        assert!(!monitor.set_status(busy.clone()));
        assert_eq!(monitor.latest_status(), busy);
    }
}
