// crates/server/src/routes/status.rs
//! Live transfer status, as last computed by the status loop.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use ingest_monitor_core::read_device_name;
use ingest_monitor_types::CurrentTransferState;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub ok: bool,
    pub active: bool,
    pub current: CurrentTransferState,
    pub device_name: Option<String>,
}

/// GET /api/status - Current transfer, or idle if none (or no log yet).
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let monitor = &state.monitor;
    let current = monitor.latest_status();
    let device_name = read_device_name(&monitor.config.device_status_path).await;

    Json(StatusResponse {
        ok: true,
        active: current.is_active(),
        current,
        device_name,
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/status", get(get_status))
}
