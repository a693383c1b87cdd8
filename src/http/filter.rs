//! Per-request deadline and body validation.
//!
//! # Responsibilities
//! - Start a deadline when the request enters the stack
//! - Answer `SERVER_TIMEOUT` when the pipeline misses the deadline
//! - Reject malformed JSON bodies with `INVALID_REQUEST` before routing
//!
//! # Design Decisions
//! - The handler future is dropped at the deadline, so it cannot write again
//! - Timed-out requests are never retried
//! - The deadline covers body buffering as well as the handler

use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::header::CONTENT_TYPE,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::request::request_id;
use crate::http::response::ApiResponse;
use crate::observability::metrics;

/// Per-process request policy.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutPolicy {
    /// Time allowed from request start to response.
    pub deadline: Duration,
    /// Largest structured body buffered for validation.
    pub max_body_bytes: usize,
}

/// Middleware entry point. Install with `axum::middleware::from_fn_with_state`.
pub async fn request_filter(
    State(policy): State<TimeoutPolicy>,
    request: Request,
    next: Next,
) -> Response {
    let id = request_id(&request).to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let pipeline = async move {
        let request = match validate_body(request, policy.max_body_bytes).await {
            Ok(request) => request,
            Err(rejection) => return rejection,
        };
        next.run(request).await
    };

    match tokio::time::timeout(policy.deadline, pipeline).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(
                request_id = %id,
                method = %method,
                path = %path,
                deadline = ?policy.deadline,
                "Request timed out"
            );
            metrics::record_timeout();
            ApiResponse::timeout(format!(
                "Request did not complete within {} seconds",
                policy.deadline.as_secs_f64()
            ))
            .into_response()
        }
    }
}

/// Buffer and parse JSON bodies, handing the bytes on unchanged.
async fn validate_body(request: Request, limit: usize) -> Result<Request, Response> {
    if !is_json(&request) {
        return Ok(request);
    }

    let id = request_id(&request).to_string();
    let (parts, body) = request.into_parts();

    let bytes = match to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %id, error = %e, "Rejecting unreadable request body");
            metrics::record_invalid_body();
            return Err(ApiResponse::invalid_request(format!(
                "Request body could not be read (limit {} bytes)",
                limit
            ))
            .into_response());
        }
    };

    if !bytes.is_empty() {
        if let Err(e) = serde_json::from_slice::<serde::de::IgnoredAny>(&bytes) {
            tracing::warn!(request_id = %id, error = %e, "Rejecting malformed JSON body");
            metrics::record_invalid_body();
            return Err(ApiResponse::invalid_request(format!("Malformed JSON body: {}", e)).into_response());
        }
    }

    Ok(Request::from_parts(parts, Body::from(bytes)))
}

fn is_json(request: &Request) -> bool {
    let Some(content_type) = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };

    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}
