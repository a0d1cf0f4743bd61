//! Match rule API routes
//!
//! # Route Structure
//!
//! - `GET /api/v1/rules` - List active rules
//! - `POST /api/v1/rules` - Create a rule
//! - `PUT /api/v1/rules/:name` - Update a rule
//! - `DELETE /api/v1/rules/:name` - Delete a rule
//! - `POST /api/v1/rules/import` - Import a rule file
//! - `GET /api/v1/rules/export` - Export active rules as a rule file
//!
//! Every write refreshes the audit matcher before responding, so the next
//! request is judged by the rules actually stored. An import that fails part
//! way keeps the rules it wrote, so it refreshes too.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};

use super::{
    commands::{
        self, CreateRuleCommand, CreateRuleError, DeleteRuleCommand, DeleteRuleError, ImportRulesCommand,
        ImportRulesError, UpdateRuleCommand, UpdateRuleError,
    },
    queries::{self, ExportRulesError, ListRulesError, ListRulesResponse},
};
use crate::api::response::ApiResponse;
use crate::error::AppError;
use crate::features::FeatureState;

// ============================================================================
// Router Configuration
// ============================================================================

pub fn rules_routes() -> Router<FeatureState> {
    Router::new()
        .route("/", get(list_rules).post(create_rule))
        .route("/import", post(import_rules))
        .route("/export", get(export_rules))
        .route("/:name", put(update_rule).delete(delete_rule))
}

async fn refresh_matcher(state: &FeatureState) {
    if let Err(e) = state.matcher.refresh().await {
        tracing::warn!(error = %e, "Rule change stored but matcher refresh failed");
    }
}

// ============================================================================
// Command Handlers (Write Operations)
// ============================================================================

/// `POST /api/v1/rules`
///
/// - `201 Created` - Rule created
/// - `400 Bad Request` - Invalid pattern
async fn create_rule(
    State(state): State<FeatureState>,
    Json(command): Json<CreateRuleCommand>,
) -> Result<Response, AppError> {
    let rule = commands::create::handle(&state.client, command).await?;
    refresh_matcher(&state).await;
    Ok(ApiResponse::success(rule).with_status(StatusCode::CREATED))
}

/// `PUT /api/v1/rules/:name`
///
/// - `200 OK` - Rule updated
/// - `400 Bad Request` - Invalid pattern
/// - `404 Not Found` - No live rule with that name
/// - `409 Conflict` - Stale `resourceVersion`
async fn update_rule(
    State(state): State<FeatureState>,
    Path(name): Path<String>,
    Json(mut command): Json<UpdateRuleCommand>,
) -> Result<Response, AppError> {
    command.name = name;
    let rule = commands::update::handle(&state.client, command).await?;
    refresh_matcher(&state).await;
    Ok(ApiResponse::success(rule).into_response())
}

/// `DELETE /api/v1/rules/:name`
async fn delete_rule(
    State(state): State<FeatureState>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    let response = commands::delete::handle(&state.client, DeleteRuleCommand { name }).await?;
    refresh_matcher(&state).await;
    Ok(ApiResponse::success(response).into_response())
}

/// `POST /api/v1/rules/import`
///
/// Accepts `{"rules": [...]}` or the older `{"interfaceLogRules": [...]}`.
async fn import_rules(
    State(state): State<FeatureState>,
    Json(command): Json<ImportRulesCommand>,
) -> Result<Response, AppError> {
    let result = commands::import::handle(&state.client, command).await;
    refresh_matcher(&state).await;
    Ok(ApiResponse::success(result?).into_response())
}

// ============================================================================
// Query Handlers (Read Operations)
// ============================================================================

/// `GET /api/v1/rules`
async fn list_rules(State(state): State<FeatureState>) -> Result<Response, AppError> {
    let items = queries::list::handle(&state.client).await?;
    let response = ListRulesResponse {
        items,
        generation: state.matcher.snapshot().map(|set| set.generation()),
    };
    Ok(ApiResponse::success(response).into_response())
}

/// `GET /api/v1/rules/export`
///
/// The body is the bare rule file so it can be saved and re-imported as is.
async fn export_rules(State(state): State<FeatureState>) -> Result<Response, AppError> {
    let file = queries::export::handle(&state.client).await?;
    Ok(Json(file).into_response())
}

// ============================================================================
// Error Handling
// ============================================================================

impl From<CreateRuleError> for AppError {
    fn from(err: CreateRuleError) -> Self {
        match err {
            CreateRuleError::PatternValidation(e) => AppError::Validation(e.to_string()),
            CreateRuleError::IdContention(_) => AppError::Conflict(err.to_string()),
            CreateRuleError::Store(e) => AppError::Store(e),
        }
    }
}

impl From<UpdateRuleError> for AppError {
    fn from(err: UpdateRuleError) -> Self {
        match err {
            UpdateRuleError::NameRequired => AppError::Validation(err.to_string()),
            UpdateRuleError::PatternValidation(e) => AppError::Validation(e.to_string()),
            UpdateRuleError::Store(e) => AppError::Store(e),
        }
    }
}

impl From<DeleteRuleError> for AppError {
    fn from(err: DeleteRuleError) -> Self {
        match err {
            DeleteRuleError::NameRequired => AppError::Validation(err.to_string()),
            DeleteRuleError::Store(e) => AppError::Store(e),
        }
    }
}

impl From<ImportRulesError> for AppError {
    fn from(err: ImportRulesError) -> Self {
        match err {
            ImportRulesError::PatternValidation { .. } => AppError::Validation(err.to_string()),
            ImportRulesError::Store(e) => AppError::Store(e),
        }
    }
}

impl From<ListRulesError> for AppError {
    fn from(err: ListRulesError) -> Self {
        match err {
            ListRulesError::Store(e) => AppError::Store(e),
        }
    }
}

impl From<ExportRulesError> for AppError {
    fn from(err: ExportRulesError) -> Self {
        match err {
            ExportRulesError::Store(e) => AppError::Store(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::shared::test_helpers::{test_state_with_store, FailAfterCreates};
    use axum::body::Body;
    use axum::http::{header, Request};
    use serde_json::json;
    use std::sync::Arc;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_failed_import_still_refreshes_matcher() {
        let state = test_state_with_store(Arc::new(FailAfterCreates::new(1)));
        let app = rules_routes().with_state(state.clone());

        let file = json!({
            "rules": [
                { "pattern": "/api/**", "isInclude": true },
                { "pattern": "/web/**", "isInclude": true }
            ]
        });
        let request = Request::builder()
            .method("POST")
            .uri("/import")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(file.to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        // the first rule was stored before the failure and is already in effect
        assert!(state.matcher.snapshot().is_some());
        assert!(state.matcher.matches("/api/items").await);
        assert!(!state.matcher.matches("/web/index").await);
    }
}
