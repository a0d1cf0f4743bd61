//! Feature modules implementing the management API
//!
//! Each feature is a vertical slice with its own commands (writes), queries
//! (reads) and routes.
//!
//! # Features
//!
//! - **rules**: Match rule CRUD plus file import and export
//! - **retention**: The retention window for log records
//! - **logs**: Searching, counting and clearing recorded requests
//! - **system**: Host disk and memory figures
//!
//! # Architecture
//!
//! Each feature module follows the structure:
//! - `commands/` - Write operations (create, update, delete)
//! - `queries/` - Read operations (list, search)
//! - `routes.rs` - HTTP route definitions
//!
//! Handlers are plain async functions taking the store client and a command
//! or query value, so they can be exercised without HTTP.

pub mod logs;
pub mod retention;
pub mod rules;
pub mod shared;
pub mod system;

use std::sync::Arc;

use axum::Router;

use crate::audit::{PathMatcher, RetentionSettings};
use crate::store::ExtensionClient;

/// Shared state for all feature routes
#[derive(Clone, Debug)]
pub struct FeatureState {
    /// Typed access to the document store
    pub client: ExtensionClient,
    /// Rule snapshot used by the audit layer; refreshed after rule writes
    pub matcher: Arc<PathMatcher>,
    pub retention: RetentionSettings,
}

impl FeatureState {
    pub fn new(client: ExtensionClient, matcher: Arc<PathMatcher>) -> Self {
        Self {
            retention: RetentionSettings::new(client.clone()),
            client,
            matcher,
        }
    }
}

/// Creates the API router with all feature routes mounted
///
/// - `/rules` - Match rule management
/// - `/retention` - Retention window
/// - `/logs` - Recorded request queries
/// - `/system-info` - Host resources
pub fn router(state: FeatureState) -> Router<()> {
    Router::new()
        .nest("/rules", rules::rules_routes())
        .nest("/retention", retention::retention_routes())
        .nest("/logs", logs::logs_routes())
        .nest("/system-info", system::system_routes())
        .with_state(state)
}
