//! API route handlers for the ingest monitor.

pub mod active;
pub mod health;
pub mod history;
pub mod metrics;
pub mod stats;
pub mod status;
pub mod stream;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Combined router.
///
/// Routes:
/// - GET /api/health - Health check
/// - GET /api/status - Live transfer state and device name
/// - GET /api/history - Recent completed transfers
/// - GET /api/stats - Totals over the stored history
/// - GET /api/active - Whether the transfer process is running
/// - GET /api/stream - SSE stream of status and update events
/// - GET /metrics - Prometheus metrics
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", status::router())
        .nest("/api", history::router())
        .nest("/api", stats::router())
        .nest("/api", active::router())
        .nest("/api", stream::router())
        .merge(metrics::router())
        .with_state(state)
}
