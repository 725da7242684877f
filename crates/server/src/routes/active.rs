// crates/server/src/routes/active.rs
//! Whether the transfer process is running right now.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::error::ApiResult;
use crate::process::is_process_running;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ActiveResponse {
    pub ok: bool,
    pub active: bool,
}

/// GET /api/active - Scan the process table for the configured process name.
pub async fn get_active(State(state): State<Arc<AppState>>) -> ApiResult<Json<ActiveResponse>> {
    let name = state.monitor.config.process_name.clone();
    let active = tokio::task::spawn_blocking(move || is_process_running(&name)).await?;
    Ok(Json(ActiveResponse { ok: true, active }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/active", get(get_active))
}
