//! Booking HTTP handlers

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use tracing::info;

use super::dto::*;
use crate::application::services::{BookingRequestItem, BookingService, ReconciliationService};
use crate::domain::{Actor, DomainError};
use crate::interfaces::http::common::{ApiError, ApiResponse, ValidatedJson};

/// Application state for booking handlers
#[derive(Clone)]
pub struct BookingAppState {
    pub bookings: Arc<BookingService>,
    pub reconciliation: Arc<ReconciliationService>,
}

/// Reserve capacity, create the booking and open a payment session
#[utoipa::path(
    post,
    path = "/api/v1/bookings",
    tag = "Bookings",
    request_body = CreateBookingRequest,
    responses(
        (status = 201, description = "Booking created, awaiting payment", body = ApiResponse<BookingDto>),
        (status = 409, description = "No capacity or sailing not bookable"),
        (status = 422, description = "Validation error"),
        (status = 502, description = "Payment gateway unavailable; booking cancelled")
    )
)]
pub async fn create_booking(
    State(state): State<BookingAppState>,
    Extension(actor): Extension<Actor>,
    ValidatedJson(request): ValidatedJson<CreateBookingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BookingDto>>), ApiError> {
    let items = request
        .items
        .into_iter()
        .map(|i| BookingRequestItem {
            category: i.category.into(),
            label: i.label,
        })
        .collect();

    let booking = state
        .bookings
        .create(&actor, request.occurrence_id, items)
        .await?;
    let payment = state.reconciliation.initiate_payment(&booking).await?;

    info!(booking_code = %booking.code, actor = %actor.id, "Booking accepted via API");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(BookingDto::new(&booking, Some(&payment)))),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/bookings/{code}",
    tag = "Bookings",
    params(("code" = String, Path, description = "Booking code")),
    responses(
        (status = 200, description = "Booking with its latest payment", body = ApiResponse<BookingDto>),
        (status = 403, description = "Booking belongs to someone else"),
        (status = 404, description = "Unknown booking code")
    )
)]
pub async fn get_booking(
    State(state): State<BookingAppState>,
    Extension(actor): Extension<Actor>,
    Path(code): Path<String>,
) -> Result<Json<ApiResponse<BookingDto>>, ApiError> {
    let booking = state.bookings.find_by_code(&code).await?;
    if !actor.can_manage_booking(&booking.created_by) {
        return Err(DomainError::Forbidden(format!("{} may not view {}", actor.id, code)).into());
    }
    let payment = state.reconciliation.payment_for(&booking).await?;
    Ok(Json(ApiResponse::success(BookingDto::new(
        &booking,
        payment.as_ref(),
    ))))
}

#[utoipa::path(
    post,
    path = "/api/v1/bookings/{code}/cancel",
    tag = "Bookings",
    params(("code" = String, Path, description = "Booking code")),
    request_body = CancelBookingRequest,
    responses(
        (status = 200, description = "Booking cancelled, capacity released", body = ApiResponse<BookingDto>),
        (status = 403, description = "Not allowed to cancel this booking"),
        (status = 404, description = "Unknown booking code"),
        (status = 409, description = "Booking can no longer be cancelled")
    )
)]
pub async fn cancel_booking(
    State(state): State<BookingAppState>,
    Extension(actor): Extension<Actor>,
    Path(code): Path<String>,
    ValidatedJson(request): ValidatedJson<CancelBookingRequest>,
) -> Result<Json<ApiResponse<BookingDto>>, ApiError> {
    let booking = state.bookings.find_by_code(&code).await?;
    let reason = request
        .reason
        .unwrap_or_else(|| format!("cancelled by {}", actor.role.as_str()));
    let cancelled = state.bookings.cancel(&actor, &booking.id, &reason).await?;
    let payment = state.reconciliation.payment_for(&cancelled).await?;
    Ok(Json(ApiResponse::success(BookingDto::new(
        &cancelled,
        payment.as_ref(),
    ))))
}
