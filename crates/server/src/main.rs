// crates/server/src/main.rs
//! Ingest monitor binary.
//!
//! Binds the HTTP server, then runs the ingest and status loops for the
//! life of the process.

use anyhow::{Context, Result};
use clap::Parser;
use ingest_monitor_server::{
    create_app, init_metrics, run_ingest_loop, run_status_loop, Args, Monitor, MonitorConfig,
};
use tracing_subscriber::EnvFilter;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "warn,ingest_monitor=info,ingest_monitor_server=info,ingest_monitor_core=info".into()
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);
    init_metrics();

    let monitor = Monitor::open(MonitorConfig::from(&args)).with_context(|| {
        format!("opening transfer history at {}", args.history_path.display())
    })?;

    let static_dir = args.resolved_static_dir();
    let app = create_app(monitor.clone(), static_dir.as_deref());

    let addr = args.addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!(
        %addr,
        log_path = %args.log_path.display(),
        history_path = %args.history_path.display(),
        "Media ingest monitor listening"
    );

    tokio::spawn(run_ingest_loop(monitor.clone()));
    tokio::spawn(run_status_loop(monitor));

    axum::serve(listener, app).await?;

    Ok(())
}
