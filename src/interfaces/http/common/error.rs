//! Mapping of application errors onto HTTP status codes

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use super::ApiResponse;
use crate::shared::errors::{BookingError, DomainError, GatewayError};

/// Handler error; renders as an `ApiResponse` with the matching status
#[derive(Debug)]
pub struct ApiError(pub BookingError);

impl<E> From<E> for ApiError
where
    BookingError: From<E>,
{
    fn from(e: E) -> Self {
        ApiError(BookingError::from(e))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            BookingError::NoCapacity(_)
            | BookingError::InvalidTransition { .. }
            | BookingError::NotYetExpired
            | BookingError::PaymentWindowExpired => StatusCode::CONFLICT,
            BookingError::EmptyBooking => StatusCode::UNPROCESSABLE_ENTITY,
            BookingError::Gateway(GatewayError::InvalidSignature)
            | BookingError::Gateway(GatewayError::InvalidPayload(_)) => StatusCode::BAD_REQUEST,
            BookingError::Gateway(_) => StatusCode::BAD_GATEWAY,
            BookingError::Domain(DomainError::NotFound { .. }) => StatusCode::NOT_FOUND,
            BookingError::Domain(DomainError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            BookingError::Domain(DomainError::Conflict(_)) => StatusCode::CONFLICT,
            BookingError::Domain(DomainError::Forbidden(_)) => StatusCode::FORBIDDEN,
            BookingError::Domain(DomainError::Database(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self.0, "Request failed");
            "internal error".to_string()
        } else {
            self.0.to_string()
        };
        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::errors::CapacityError;

    #[test]
    fn maps_errors_to_status_codes() {
        let status = |e: BookingError| ApiError(e).status();

        assert_eq!(
            status(BookingError::NoCapacity(CapacityError::CapacityExceeded {
                category: "car",
                requested: 1,
                available: 0,
            })),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(BookingError::invalid_transition("booking", "EXPIRED", "CONFIRMED")),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(DomainError::not_found("Booking", "code", "X").into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(DomainError::Forbidden("no".into()).into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status(GatewayError::InvalidSignature.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(GatewayError::GatewayUnavailable("timeout".into()).into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status(DomainError::Database("disk full".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
