//! Axum routes exposing an [`OperationRegistry`].
//!
//! Every operation answers on two paths, for any method:
//!
//! - `/entrypoints/{key}/invoke`
//! - `/service/{key}`
//!
//! A completed call returns `200 {"output": ...}`, plus `X-PAYMENT-RESPONSE`
//! when the payment was settled. A challenge returns `402` with the challenge
//! body. Failures return `{"error": "..."}` with a status chosen by
//! [`DispatchError`].

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::any;
use serde_json::json;
use shadowgate::OperationError;

use super::error::DispatchError;
use super::registry::{Dispatched, OperationRegistry, OperationRequest, RequestBody};
use crate::constants::X_PAYMENT_RESPONSE_HEADER;
use crate::headers::encode_payment_response;

/// Routes for every operation in `registry`.
pub fn operation_routes<S>(registry: Arc<OperationRegistry>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/entrypoints/{key}/invoke", any(invoke))
        .route("/service/{key}", any(invoke))
        .with_state(registry)
}

async fn invoke(
    State(registry): State<Arc<OperationRegistry>>,
    Path(key): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = OperationRequest {
        method,
        uri,
        headers,
        body: RequestBody::from_bytes(&body),
    };
    match registry.dispatch(&key, request).await {
        Ok(dispatched) => dispatched.into_response(),
        Err(err) => err.into_response(),
    }
}

impl IntoResponse for Dispatched {
    fn into_response(self) -> Response {
        match self {
            Self::Challenged(challenge) => {
                (StatusCode::PAYMENT_REQUIRED, Json(challenge)).into_response()
            }
            Self::Completed { result, admission } => {
                let mut response = Json(json!({ "output": result.output })).into_response();
                if let Some(settlement) = &admission.settlement {
                    match encode_payment_response(settlement) {
                        Ok(value) => {
                            response
                                .headers_mut()
                                .insert(X_PAYMENT_RESPONSE_HEADER, value);
                        }
                        Err(_err) => {
                            #[cfg(feature = "telemetry")]
                            tracing::error!(error = %_err, "failed to encode settlement header");
                        }
                    }
                }
                response
            }
        }
    }
}

impl DispatchError {
    /// HTTP status of this failure.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::UnknownOperation(_) => StatusCode::NOT_FOUND,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Operation(err) => match err {
                OperationError::NotFound(_) => StatusCode::NOT_FOUND,
                OperationError::Gone(_) => StatusCode::GONE,
                OperationError::InvalidState(_) => StatusCode::BAD_REQUEST,
                OperationError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                OperationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = self.status();
        #[cfg(feature = "telemetry")]
        {
            if status.is_server_error() {
                tracing::error!(error = %self, "operation failed");
            } else {
                tracing::debug!(error = %self, %status, "operation refused");
            }
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
