//! Router assembly
//!
//! [`create_router`] mounts the management API under `/api/v1`, adds the
//! health probe, and wraps everything in the middleware stack. The audit
//! layer sits innermost so it sees uncompressed response bodies.

pub mod response;

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::compression::CompressionLayer;

use crate::audit::{AuditLayer, PathMatcher, RecordWriter};
use crate::config::Config;
use crate::features::{self, FeatureState};
use crate::middleware;
use crate::store::{DocumentStore, ExtensionClient};

/// Everything the router needs, built once at startup
#[derive(Clone, Debug)]
pub struct AppState {
    pub client: ExtensionClient,
    pub matcher: Arc<PathMatcher>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let client = ExtensionClient::new(store);
        let matcher = Arc::new(PathMatcher::new(client.clone()));
        Self { client, matcher }
    }

    pub fn feature_state(&self) -> FeatureState {
        FeatureState::new(self.client.clone(), self.matcher.clone())
    }
}

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState, config: &Config) -> anyhow::Result<Router> {
    let audit = AuditLayer::new(
        state.matcher.clone(),
        RecordWriter::new(state.client.clone(), config.audit.write_timeout()),
        config.audit.capture_config()?,
    );

    let router = Router::new()
        .route("/health", get(health_check))
        .with_state(state.clone())
        .nest("/api/v1", features::router(state.feature_state()))
        // Apply layers from innermost to outermost
        .layer(audit)
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors));

    Ok(router)
}

/// Health check handler
async fn health_check(State(state): State<AppState>) -> Result<Response, StatusCode> {
    match state.client.store().health_check().await {
        Ok(()) => Ok((
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "store": "connected",
                "rulesGeneration": state.matcher.snapshot().map(|set| set.generation()),
            })),
        )
            .into_response()),
        Err(e) => {
            tracing::error!("Store health check failed: {:?}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        },
    }
}
