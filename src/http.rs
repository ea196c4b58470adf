//! HTTP intake surface: maps `POST /payments` onto the intake use case.
//!
//! Thin by design; everything interesting happens behind
//! [`CreatePaymentService`]; this layer only parses the body, runs the
//! use case, and maps [`DomainError`] codes onto status codes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app::{CreatePaymentRequest, CreatePaymentService};
use crate::error::{DomainError, ErrorCode};

/// Error wrapper implementing the HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::Domain(err) = self;

        let status = match err.code() {
            ErrorCode::ValidationFailed
            | ErrorCode::InvalidAmount
            | ErrorCode::InvalidCurrency => StatusCode::BAD_REQUEST,
            ErrorCode::WalletNotFound => StatusCode::NOT_FOUND,
            ErrorCode::InsufficientFunds | ErrorCode::CurrencyMismatch => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = json!({
            "error": {
                "code": err.code().as_str(),
                "message": err.message(),
            }
        });
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentBody {
    user_id: String,
    amount: f64,
    currency: String,
    service_id: String,
    idempotency_key: String,
    #[serde(default)]
    client_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentReply {
    payment_id: String,
    status: String,
}

/// Build the router. The intake service is the only shared state.
pub fn router(service: Arc<CreatePaymentService>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/payments", post(create_payment_handler))
        .with_state(service)
}

/// Serve the intake API at the given address (e.g. `"0.0.0.0:3000"`).
pub async fn serve(service: Arc<CreatePaymentService>, addr: &str) -> Result<(), std::io::Error> {
    let app = router(service);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "intake API listening");
    axum::serve(listener, app).await
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn create_payment_handler(
    State(service): State<Arc<CreatePaymentService>>,
    Json(body): Json<CreatePaymentBody>,
) -> Result<impl IntoResponse, ApiError> {
    let response = service.execute(CreatePaymentRequest {
        user_id: body.user_id,
        amount: body.amount,
        currency: body.currency,
        service_id: body.service_id,
        idempotency_key: body.idempotency_key,
        client_id: body.client_id,
    })?;

    Ok(Json(CreatePaymentReply {
        payment_id: response.payment_id.to_string(),
        status: response.status.to_string(),
    }))
}
