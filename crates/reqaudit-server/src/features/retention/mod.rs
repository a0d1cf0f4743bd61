//! Retention window for log records
//!
//! - `GET /api/v1/retention` - Current setting, created with the default of
//!   7 days on first read
//! - `PUT /api/v1/retention` - Set `{days}`
//!
//! The sweeper reads the setting on every run, so changes take effect at the
//! next scheduled sweep.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::response::ApiResponse;
use crate::audit::{models::MAX_RETENTION_DAYS, RetentionSetting};
use crate::error::AppError;
use crate::features::FeatureState;
use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionResponse {
    pub days: u32,
}

impl From<RetentionSetting> for RetentionResponse {
    fn from(setting: RetentionSetting) -> Self {
        Self {
            days: setting.spec.days,
        }
    }
}

/// `{ "days": 30 }`. Signed so negative input reaches validation instead of
/// failing deserialization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SetRetentionCommand {
    pub days: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum RetentionError {
    #[error("Retention days must be zero or greater, got {0}")]
    Negative(i64),

    #[error("Retention days must be at most {max}, got {got}")]
    TooLarge { got: i64, max: u32 },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl SetRetentionCommand {
    pub fn validate(&self) -> Result<u32, RetentionError> {
        if self.days < 0 {
            return Err(RetentionError::Negative(self.days));
        }
        match u32::try_from(self.days) {
            Ok(days) if days <= MAX_RETENTION_DAYS => Ok(days),
            _ => Err(RetentionError::TooLarge {
                got: self.days,
                max: MAX_RETENTION_DAYS,
            }),
        }
    }
}

#[tracing::instrument(skip(state))]
pub async fn get_retention(state: &FeatureState) -> Result<RetentionResponse, RetentionError> {
    Ok(state.retention.get_or_create().await?.into())
}

#[tracing::instrument(skip(state))]
pub async fn set_retention(
    state: &FeatureState,
    command: SetRetentionCommand,
) -> Result<RetentionResponse, RetentionError> {
    let days = command.validate()?;
    Ok(state.retention.set_days(days).await?.into())
}

pub fn retention_routes() -> Router<FeatureState> {
    Router::new().route("/", get(get_handler).put(put_handler))
}

async fn get_handler(State(state): State<FeatureState>) -> Result<Response, AppError> {
    let response = get_retention(&state).await?;
    Ok(ApiResponse::success(response).into_response())
}

async fn put_handler(
    State(state): State<FeatureState>,
    Json(command): Json<SetRetentionCommand>,
) -> Result<Response, AppError> {
    let response = set_retention(&state, command).await?;
    Ok(ApiResponse::success(response).into_response())
}

impl From<RetentionError> for AppError {
    fn from(err: RetentionError) -> Self {
        match err {
            RetentionError::Negative(_) | RetentionError::TooLarge { .. } => AppError::Validation(err.to_string()),
            RetentionError::Store(e) => AppError::Store(e),
        }
    }
}
