// crates/server/src/routes/stats.rs
//! Aggregate history statistics.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use ingest_monitor_types::HistoryStats;
use serde::Serialize;

use crate::error::ApiResult;
use crate::state::AppState;

/// Stats as the dashboard expects them: total volume as a two-decimal string.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct StatsBody {
    pub total_files: usize,
    #[serde(rename = "totalGB")]
    pub total_gb: String,
    pub last_active: Option<i64>,
}

impl From<HistoryStats> for StatsBody {
    fn from(stats: HistoryStats) -> Self {
        Self {
            total_files: stats.total_files,
            total_gb: format!("{:.2}", stats.total_gb),
            last_active: stats.last_active,
        }
    }
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct StatsResponse {
    pub ok: bool,
    pub stats: StatsBody,
}

/// GET /api/stats - File count, total GB and last completion time.
pub async fn get_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<StatsResponse>> {
    let store = state.monitor.history.clone();
    let stats = tokio::task::spawn_blocking(move || store.stats()).await??;

    Ok(Json(StatsResponse {
        ok: true,
        stats: stats.into(),
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/stats", get(get_stats))
}
