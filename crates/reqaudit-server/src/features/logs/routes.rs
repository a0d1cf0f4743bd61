//! Log record API routes
//!
//! # Route Structure
//!
//! - `POST /api/v1/logs/search` - Filtered, paginated search
//! - `GET /api/v1/logs/suggestions/:field?prefix=` - Distinct values for
//!   `username`, `clientIp` or `path`
//! - `GET /api/v1/logs/count` - Number of live records
//! - `DELETE /api/v1/logs` - Delete all records

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;

use super::{
    commands::{self, DeleteAllLogsError},
    queries::{
        self, CountLogsError, SearchLogsError, SearchLogsQuery, SuggestionField, SuggestionsError,
        SuggestionsQuery,
    },
};
use crate::api::response::ApiResponse;
use crate::error::AppError;
use crate::features::FeatureState;

// ============================================================================
// Router Configuration
// ============================================================================

pub fn logs_routes() -> Router<FeatureState> {
    Router::new()
        .route("/", delete(delete_all_logs))
        .route("/search", post(search_logs))
        .route("/suggestions/:field", get(suggestions))
        .route("/count", get(count_logs))
}

// ============================================================================
// Command Handlers (Write Operations)
// ============================================================================

/// `DELETE /api/v1/logs`
async fn delete_all_logs(State(state): State<FeatureState>) -> Result<Response, AppError> {
    let response = commands::delete_all::handle(&state.client).await?;
    Ok(ApiResponse::success(response).into_response())
}

// ============================================================================
// Query Handlers (Read Operations)
// ============================================================================

/// `POST /api/v1/logs/search`
///
/// Items are in `data`, pagination in `meta.pagination`.
async fn search_logs(
    State(state): State<FeatureState>,
    Json(query): Json<SearchLogsQuery>,
) -> Result<Response, AppError> {
    let response = queries::search::handle(&state.client, query).await?;
    let meta = json!({ "pagination": response.pagination });
    Ok(ApiResponse::success_with_meta(response.items, meta).into_response())
}

/// `GET /api/v1/logs/suggestions/:field?prefix=al`
async fn suggestions(
    State(state): State<FeatureState>,
    Path(field): Path<String>,
    Query(query): Query<SuggestionsQuery>,
) -> Result<Response, AppError> {
    let field: SuggestionField = field.parse()?;
    let suggestions = queries::suggestions::handle(&state.client, field, query).await?;
    Ok(ApiResponse::success(suggestions).into_response())
}

/// `GET /api/v1/logs/count`
async fn count_logs(State(state): State<FeatureState>) -> Result<Response, AppError> {
    let response = queries::count::handle(&state.client).await?;
    Ok(ApiResponse::success(response).into_response())
}

// ============================================================================
// Error Handling
// ============================================================================

impl From<DeleteAllLogsError> for AppError {
    fn from(err: DeleteAllLogsError) -> Self {
        match err {
            DeleteAllLogsError::Partial { .. } => AppError::Internal(err.to_string()),
            DeleteAllLogsError::Store(e) => AppError::Store(e),
        }
    }
}

impl From<SearchLogsError> for AppError {
    fn from(err: SearchLogsError) -> Self {
        match err {
            SearchLogsError::Pagination(_) | SearchLogsError::InvertedRange => {
                AppError::Validation(err.to_string())
            },
            SearchLogsError::Store(e) => AppError::Store(e),
        }
    }
}

impl From<SuggestionsError> for AppError {
    fn from(err: SuggestionsError) -> Self {
        match err {
            SuggestionsError::UnknownField(_) => AppError::Validation(err.to_string()),
            SuggestionsError::Store(e) => AppError::Store(e),
        }
    }
}

impl From<CountLogsError> for AppError {
    fn from(err: CountLogsError) -> Self {
        match err {
            CountLogsError::Store(e) => AppError::Store(e),
        }
    }
}
