//! Extractors whose rejections use the `ApiResponse` envelope.
//!
//! The request filter only inspects non-empty bodies labelled as JSON. Bodies
//! that are empty or carry another content type reach the handler, and
//! axum's own `Json` rejection would answer them with plain text.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::http::request::request_id;
use crate::http::response::ApiResponse;
use crate::observability::metrics;

/// `Json<T>` that rejects with `INVALID_REQUEST`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiResponse;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let id = request_id(&request).to_string();

        match Json::<T>::from_request(request, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(reject(&id, rejection)),
        }
    }
}

fn reject(id: &str, rejection: JsonRejection) -> ApiResponse {
    tracing::warn!(
        request_id = %id,
        status = rejection.status().as_u16(),
        error = %rejection.body_text(),
        "Rejecting request body"
    );
    metrics::record_invalid_body();
    ApiResponse::invalid_request(rejection.body_text())
}
