//! Structured response bodies.
//!
//! # Responsibilities
//! - Define the `{type, data | err}` envelope every core responder uses
//! - Map each response kind to its HTTP status code
//!
//! # Design Decisions
//! - Callers never see a raw framework error from the core
//! - The kind is serialized in SCREAMING_SNAKE_CASE (`SERVER_TIMEOUT`)

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Classification carried in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseKind {
    Success,
    ServerTimeout,
    InvalidRequest,
    NotFound,
    ServerError,
}

impl ResponseKind {
    pub fn status(self) -> StatusCode {
        match self {
            ResponseKind::Success => StatusCode::OK,
            ResponseKind::ServerTimeout => StatusCode::SERVICE_UNAVAILABLE,
            ResponseKind::InvalidRequest => StatusCode::BAD_REQUEST,
            ResponseKind::NotFound => StatusCode::NOT_FOUND,
            ResponseKind::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

impl ApiResponse {
    pub fn success(data: Value) -> Self {
        Self {
            kind: ResponseKind::Success,
            data: Some(data),
            err: None,
        }
    }

    pub fn error(kind: ResponseKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            data: None,
            err: Some(message.into()),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::error(ResponseKind::ServerTimeout, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::error(ResponseKind::InvalidRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::error(ResponseKind::NotFound, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::error(ResponseKind::ServerError, message)
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.kind.status(), Json(self)).into_response()
    }
}
