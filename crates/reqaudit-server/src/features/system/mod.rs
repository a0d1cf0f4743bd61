//! Host resource figures
//!
//! `GET /api/v1/system-info` reports disk space for the root filesystem and
//! physical memory, all in bytes. "Unusable" is the part not currently free.

use std::path::Path;

use axum::{
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use sysinfo::{Disks, System};

use crate::api::response::ApiResponse;
use crate::error::AppError;
use crate::features::FeatureState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub total_space: u64,
    pub unusable_space: u64,
    pub total_memory: u64,
    pub unusable_memory: u64,
}

impl SystemInfo {
    /// Reads current figures. Blocks while sysinfo scans mounts, so call it
    /// off the async executor.
    pub fn collect() -> Self {
        let disks = Disks::new_with_refreshed_list();
        let root = disks.list().iter().find(|disk| disk.mount_point() == Path::new("/"));

        // no root mount (e.g. some containers): fall back to every disk
        let (total_space, free_space) = match root {
            Some(disk) => (disk.total_space(), disk.available_space()),
            None => disks.list().iter().fold((0, 0), |(total, free), disk| {
                (total + disk.total_space(), free + disk.available_space())
            }),
        };

        let mut system = System::new();
        system.refresh_memory();
        let total_memory = system.total_memory();
        let free_memory = system.free_memory();

        Self {
            total_space,
            unusable_space: total_space.saturating_sub(free_space),
            total_memory,
            unusable_memory: total_memory.saturating_sub(free_memory),
        }
    }
}

#[tracing::instrument]
pub async fn handle() -> Result<SystemInfo, AppError> {
    tokio::task::spawn_blocking(SystemInfo::collect)
        .await
        .map_err(|e| AppError::Internal(format!("System info task failed: {e}")))
}

pub fn system_routes() -> Router<FeatureState> {
    Router::new().route("/", get(system_info))
}

/// `GET /api/v1/system-info`
async fn system_info() -> Result<Response, AppError> {
    let info = handle().await?;
    tracing::debug!(
        total_space = info.total_space,
        total_memory = info.total_memory,
        "System info collected"
    );
    Ok(ApiResponse::success(info).into_response())
}
