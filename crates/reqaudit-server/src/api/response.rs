//! API response types
//!
//! Every management endpoint wraps its payload in [`ApiResponse`]; errors use
//! the `{"error": {...}}` shape produced by [`crate::error::AppError`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Standard success response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new success response
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
            meta: None,
        }
    }

    /// Create a success response with metadata
    pub fn success_with_meta(data: T, meta: serde_json::Value) -> Self {
        Self {
            success: true,
            data,
            meta: Some(meta),
        }
    }

    /// Same payload with a non-200 status, e.g. `201 Created`
    pub fn with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_response() {
        let value = serde_json::to_value(ApiResponse::success(json!({ "days": 7 }))).unwrap();
        assert_eq!(value, json!({ "success": true, "data": { "days": 7 } }));
    }

    #[test]
    fn test_success_with_meta() {
        let response = ApiResponse::success_with_meta(vec![1, 2], json!({ "total": 2 }));
        let value = serde_json::to_value(response).unwrap();
        assert_eq!(value["meta"]["total"], 2);
        assert_eq!(value["data"], json!([1, 2]));
    }
}
