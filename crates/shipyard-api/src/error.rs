//! JSON error responses with machine-stable tags.
//!
//! The `error` tag is the API contract; `detail` is free text for
//! operators and may change.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// An error response: HTTP status, stable tag, optional operator detail.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub tag: &'static str,
    pub detail: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, tag: &'static str) -> Self {
        Self {
            status,
            tag,
            detail: None,
        }
    }

    pub fn with_detail(status: StatusCode, tag: &'static str, detail: impl Into<String>) -> Self {
        Self {
            status,
            tag,
            detail: Some(detail.into()),
        }
    }

    pub fn bad_request(tag: &'static str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, tag)
    }

    pub fn unauthorized(tag: &'static str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, tag)
    }

    pub fn not_found(tag: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, tag)
    }

    pub fn conflict(tag: &'static str) -> Self {
        Self::new(StatusCode::CONFLICT, tag)
    }

    pub fn internal(tag: &'static str, detail: impl Into<String>) -> Self {
        Self::with_detail(StatusCode::INTERNAL_SERVER_ERROR, tag, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "status": "error",
            "error": self.tag,
        });
        if let Some(detail) = self.detail {
            body["detail"] = json!(detail);
        }
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_carries_tag_and_status() {
        let resp = ApiError::bad_request("missing_site").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn detail_is_optional() {
        let err = ApiError::not_found("site_not_found");
        assert!(err.detail.is_none());
        let err = ApiError::internal("deployment_failed", "disk full");
        assert_eq!(err.detail.as_deref(), Some("disk full"));
    }
}
