//! Liveness endpoint.
//!
//! Returns `SUCCESS` whenever the process can answer HTTP. It checks nothing
//! else, so a probe that reaches it proves the listener is live.

use std::time::Instant;

use axum::{extract::State, routing::get, Router};
use serde_json::json;

use crate::http::response::ApiResponse;

/// Identity reported by the liveness endpoint.
#[derive(Debug, Clone, Copy)]
pub struct Liveness {
    pub worker_index: Option<usize>,
    pub started_at: Instant,
}

impl Liveness {
    pub fn new(worker_index: Option<usize>) -> Self {
        Self {
            worker_index,
            started_at: Instant::now(),
        }
    }
}

pub async fn liveness(State(info): State<Liveness>) -> ApiResponse {
    ApiResponse::success(json!({
        "status": "ok",
        "pid": std::process::id(),
        "worker": info.worker_index,
        "uptime_secs": info.started_at.elapsed().as_secs(),
    }))
}

/// Router serving the liveness endpoint at `path`.
pub fn router(path: &str, info: Liveness) -> Router {
    Router::new().route(path, get(liveness)).with_state(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn reports_ok_with_identity() {
        let response = router("/health", Liveness::new(Some(2)))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["type"], "SUCCESS");
        assert_eq!(body["data"]["status"], "ok");
        assert_eq!(body["data"]["worker"], 2);
        assert_eq!(body["data"]["pid"], std::process::id());
    }
}
