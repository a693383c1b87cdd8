//! Demo application routes served by the binary.
//!
//! The core owns only the liveness and catch-all routes; everything here is
//! what an embedding application would supply.

use std::time::Duration;

use axum::{
    extract::{rejection::PathRejection, Path},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};

use crate::http::extract::ApiJson;
use crate::http::response::ApiResponse;

pub fn routes() -> Router {
    Router::new()
        .route("/echo", post(echo))
        .route("/sleep/{millis}", get(sleep))
}

/// Returns the posted JSON document.
async fn echo(ApiJson(body): ApiJson<Value>) -> ApiResponse {
    ApiResponse::success(body)
}

/// Sleeps before answering; useful for exercising timeouts and draining.
async fn sleep(millis: Result<Path<u64>, PathRejection>) -> ApiResponse {
    let millis = match millis {
        Ok(Path(millis)) => millis,
        Err(rejection) => return ApiResponse::invalid_request(rejection.body_text()),
    };
    tokio::time::sleep(Duration::from_millis(millis)).await;
    ApiResponse::success(json!({ "slept_ms": millis }))
}
