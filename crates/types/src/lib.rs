// crates/types/src/lib.rs
//! Shared data model for the ingest monitor.
//!
//! Everything here crosses a boundary: it is persisted to the history file,
//! returned by the HTTP API, or pushed to stream subscribers. Field names are
//! camelCase on the wire so the dashboard can consume them unchanged.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Whether a transferred file is a film or an episode of a show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(
    feature = "codegen",
    ts(export, export_to = "../../../client/src/types/generated/")
)]
pub enum MediaType {
    Movie,
    Series,
}

/// A persisted fact that one media file finished transferring.
///
/// Created by the transfer parser, owned by the history store afterwards and
/// never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(
    feature = "codegen",
    ts(export, export_to = "../../../client/src/types/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    /// Basename of the transferred file.
    pub filename: String,
    /// Human-readable size token as printed by the transfer tool (`1.77G`).
    pub size: String,
    /// Human-readable rate (`47.56MB/s`).
    pub speed: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    /// Processing time in epoch milliseconds.
    #[ts(type = "number")]
    pub timestamp: i64,
    /// Grouping label from the `SYNC_START:<label>` marker, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub session: Option<String>,
}

/// Live progress of the transfer currently in flight.
///
/// Idle is `filename == None && progress == 0` with every other field empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(
    feature = "codegen",
    ts(export, export_to = "../../../client/src/types/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct CurrentTransferState {
    pub filename: Option<String>,
    pub progress: u8,
    pub speed: Option<String>,
    pub time_remaining: Option<String>,
    pub size: Option<String>,
}

impl CurrentTransferState {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        self.filename.is_none() && self.progress == 0
    }

    /// The dashboard's notion of "something is happening".
    pub fn is_active(&self) -> bool {
        !self.is_idle()
    }
}

/// Aggregate view over the persisted history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(
    feature = "codegen",
    ts(export, export_to = "../../../client/src/types/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total_files: usize,
    #[serde(rename = "totalGB")]
    pub total_gb: f64,
    #[ts(type = "number | null")]
    pub last_active: Option<i64>,
}

/// Payload of an `update` stream event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(
    feature = "codegen",
    ts(export, export_to = "../../../client/src/types/generated/")
)]
pub struct CompletedBatch {
    pub completed: Vec<TransferRecord>,
}

/// A message pushed to every live subscriber.
///
/// Serializes as `{"type": "status", "data": {...}}` or
/// `{"type": "update", "data": {"completed": [...]}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(
    feature = "codegen",
    ts(export, export_to = "../../../client/src/types/generated/")
)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum StreamEvent {
    Status(CurrentTransferState),
    Update(CompletedBatch),
}

impl StreamEvent {
    pub fn status(state: CurrentTransferState) -> Self {
        Self::Status(state)
    }

    pub fn update(completed: Vec<TransferRecord>) -> Self {
        Self::Update(CompletedBatch { completed })
    }

    /// Short name used in logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::Update(_) => "update",
        }
    }
}
