// crates/server/src/config.rs
//! Command-line and environment configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

pub const DEFAULT_LOG_PATH: &str = "/var/log/media-ingest.log";
pub const DEFAULT_HISTORY_PATH: &str = "./history.json";
pub const DEFAULT_DEVICE_STATUS_PATH: &str = "/tmp/ingest-device.json";
pub const DEFAULT_PORT: u16 = 3000;

/// Live dashboard for a media ingest job.
#[derive(Parser, Debug, Clone)]
#[command(name = "ingest-monitor", version)]
#[command(about = "Tails a media ingest log and serves live transfer status and history")]
pub struct Args {
    /// Transfer log written by the ingest job
    #[arg(long, env = "INGEST_LOG_PATH", default_value = DEFAULT_LOG_PATH)]
    pub log_path: PathBuf,

    /// JSON file holding completed transfers
    #[arg(long, env = "INGEST_HISTORY_PATH", default_value = DEFAULT_HISTORY_PATH)]
    pub history_path: PathBuf,

    /// Optional JSON file naming the connected device
    #[arg(long, env = "INGEST_DEVICE_STATUS", default_value = DEFAULT_DEVICE_STATUS_PATH)]
    pub device_status_path: PathBuf,

    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "INGEST_BIND", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Dashboard files to serve at `/`
    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// How often new log lines are ingested
    #[arg(long, default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// How often live status is pushed to subscribers
    #[arg(long, default_value_t = 500)]
    pub status_interval_ms: u64,

    /// Trailing lines examined for live status
    #[arg(long, default_value_t = 500)]
    pub window_lines: usize,

    /// Process whose presence means a transfer is running
    #[arg(long, default_value = "rsync")]
    pub process_name: String,

    /// Start tailing at the current end of the log instead of its beginning
    #[arg(long)]
    pub skip_existing: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "INGEST_LOG_JSON")]
    pub log_json: bool,
}

impl Args {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms.max(1))
    }

    /// `--static-dir`, else `./dist` if it exists, else API only.
    pub fn resolved_static_dir(&self) -> Option<PathBuf> {
        self.static_dir.clone().or_else(|| {
            let dist = PathBuf::from("dist");
            dist.exists().then_some(dist)
        })
    }
}
