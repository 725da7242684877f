// crates/server/src/routes/history.rs
//! Recent completed transfers.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use ingest_monitor_core::history::HISTORY_CAP;
use ingest_monitor_types::TransferRecord;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub const DEFAULT_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HistoryResponse {
    pub ok: bool,
    pub history: Vec<TransferRecord>,
}

/// GET /api/history?limit=n - Most recent first, default 10, at most 100.
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<Json<HistoryResponse>> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(HISTORY_CAP);
    let store = state.monitor.history.clone();

    let history = tokio::task::spawn_blocking(move || store.recent(limit)).await??;

    Ok(Json(HistoryResponse { ok: true, history }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/history", get(get_history))
}
