// crates/core/src/device.rs
//! Optional device side-channel.
//!
//! The ingest wrapper may drop a small JSON file naming the source device
//! (`{"deviceName": "..."}`, older wrappers write `{"name": "..."}`). Its
//! absence is normal and never an error.

use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct DeviceStatus {
    #[serde(rename = "deviceName", alias = "name", default)]
    device_name: Option<String>,
}

/// Name of the connected device, if the side-channel file says so.
pub async fn read_device_name(path: &Path) -> Option<String> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "No device status");
            return None;
        }
    };

    parse_device_name(&content)
}

fn parse_device_name(content: &str) -> Option<String> {
    match serde_json::from_str::<DeviceStatus>(content) {
        Ok(status) => status
            .device_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring malformed device status");
            None
        }
    }
}
