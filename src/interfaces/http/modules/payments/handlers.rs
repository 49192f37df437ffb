//! Payment gateway webhook

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::application::services::ReconciliationService;
use crate::interfaces::http::common::{ApiError, ApiResponse};
use crate::shared::errors::{BookingError, DomainError, GatewayError};

/// Optional out-of-band signature; Midtrans puts it in the body as `signature_key`
pub const SIGNATURE_HEADER: &str = "x-signature-key";

#[derive(Clone)]
pub struct PaymentAppState {
    pub reconciliation: Arc<ReconciliationService>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotificationAck {
    /// applied, duplicate, unchanged, rejected or ignored
    pub outcome: String,
}

fn ack(outcome: &str) -> Json<ApiResponse<NotificationAck>> {
    Json(ApiResponse::success(NotificationAck {
        outcome: outcome.to_string(),
    }))
}

/// Gateway HTTP notification. Answers 200 whenever the payload was
/// authentic, even if it changed nothing, so the gateway stops retrying.
#[utoipa::path(
    post,
    path = "/api/v1/payments/notification",
    tag = "Payments",
    request_body(content = String, description = "Raw gateway notification JSON", content_type = "application/json"),
    responses(
        (status = 200, description = "Notification accepted", body = ApiResponse<NotificationAck>),
        (status = 400, description = "Signature or payload invalid; nothing applied"),
        (status = 500, description = "Storage failure; gateway should retry")
    )
)]
pub async fn payment_notification(
    State(state): State<PaymentAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<NotificationAck>>), ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    match state.reconciliation.on_notification(&body, signature).await {
        Ok(outcome) => {
            debug!(outcome = outcome.as_label(), "Notification processed");
            Ok((StatusCode::OK, ack(outcome.as_label())))
        }
        Err(BookingError::Domain(DomainError::NotFound { value, .. })) => {
            // Not ours (or already purged); retrying will not help
            warn!(order_id = %value, "Acknowledging notification for unknown order");
            Ok((StatusCode::OK, ack("ignored")))
        }
        Err(e @ BookingError::Gateway(GatewayError::InvalidSignature))
        | Err(e @ BookingError::Gateway(GatewayError::InvalidPayload(_))) => Err(ApiError(e)),
        Err(e @ BookingError::Domain(DomainError::Database(_))) => Err(ApiError(e)),
        Err(e) => {
            // Authentic but not applicable (e.g. booking moved on); logged by the service
            debug!(error = %e, "Notification acknowledged without effect");
            Ok((StatusCode::OK, ack("ignored")))
        }
    }
}
