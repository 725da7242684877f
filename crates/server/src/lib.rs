// crates/server/src/lib.rs
//! Ingest monitor server library.
//!
//! Runs the ingest and status loops over a media-ingest log and serves the
//! results over HTTP: JSON snapshots, an SSE push stream and Prometheus
//! metrics, plus the dashboard's static files when present.

pub mod config;
pub mod error;
pub mod hub;
pub mod metrics;
pub mod poller;
pub mod process;
pub mod routes;
pub mod state;

pub use config::Args;
pub use error::*;
pub use hub::{BroadcastHub, EventSink, SubscriptionGuard};
pub use metrics::init_metrics;
pub use poller::{run_ingest_loop, run_status_loop};
pub use routes::api_routes;
pub use state::{AppState, Monitor, MonitorConfig};

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// Create the Axum application for `monitor`.
///
/// This sets up:
/// - API routes and `/metrics`
/// - Static dashboard files with an `index.html` fallback, if `static_dir` is given
/// - CORS (allows any origin)
/// - Request tracing
pub fn create_app(monitor: Arc<Monitor>, static_dir: Option<&Path>) -> Router {
    let state = AppState::new(monitor);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = api_routes(state);
    if let Some(dir) = static_dir {
        tracing::info!(path = %dir.display(), "Serving dashboard files");
        let index = ServeFile::new(dir.join("index.html"));
        app = app.fallback_service(ServeDir::new(dir).fallback(index));
    }

    app.layer(cors).layer(TraceLayer::new_for_http())
}

// ============================================================================
// Integration Tests
// ============================================================================
