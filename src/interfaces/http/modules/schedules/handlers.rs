//! Schedule occurrence HTTP handlers (staff only, except reads)

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use super::dto::*;
use crate::application::services::ScheduleService;
use crate::domain::Actor;
use crate::interfaces::http::common::{ApiError, ApiResponse, ValidatedJson};

#[derive(Clone)]
pub struct ScheduleAppState {
    pub schedules: Arc<ScheduleService>,
}

#[utoipa::path(
    post,
    path = "/api/v1/schedules",
    tag = "Schedules",
    request_body = CreateOccurrenceRequest,
    responses(
        (status = 201, description = "Occurrence created", body = ApiResponse<OccurrenceDto>),
        (status = 403, description = "Staff only"),
        (status = 422, description = "Validation error")
    )
)]
pub async fn create_occurrence(
    State(state): State<ScheduleAppState>,
    Extension(actor): Extension<Actor>,
    ValidatedJson(request): ValidatedJson<CreateOccurrenceRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OccurrenceDto>>), ApiError> {
    let occurrence = state
        .schedules
        .create_occurrence(
            &actor,
            request.schedule_id,
            request.sailing_date,
            request.capacity.into(),
            request.fares.into(),
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(OccurrenceDto::from(&occurrence))),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/schedules/{id}",
    tag = "Schedules",
    params(("id" = i64, Path, description = "Occurrence id")),
    responses(
        (status = 200, description = "Occurrence with capacity counters", body = ApiResponse<OccurrenceDto>),
        (status = 404, description = "Unknown occurrence")
    )
)]
pub async fn get_occurrence(
    State(state): State<ScheduleAppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<OccurrenceDto>>, ApiError> {
    let occurrence = state.schedules.get(id).await?;
    Ok(Json(ApiResponse::success(OccurrenceDto::from(&occurrence))))
}

#[utoipa::path(
    put,
    path = "/api/v1/schedules/{id}/status",
    tag = "Schedules",
    params(("id" = i64, Path, description = "Occurrence id")),
    request_body = UpdateScheduleStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = ApiResponse<OccurrenceDto>),
        (status = 403, description = "Staff only"),
        (status = 404, description = "Unknown occurrence"),
        (status = 422, description = "Delay deadline in the past")
    )
)]
pub async fn update_status(
    State(state): State<ScheduleAppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
    ValidatedJson(request): ValidatedJson<UpdateScheduleStatusRequest>,
) -> Result<Json<ApiResponse<OccurrenceDto>>, ApiError> {
    let occurrence = state
        .schedules
        .set_status(
            &actor,
            id,
            request.status.into(),
            request.reason,
            request.expires_at,
        )
        .await?;
    Ok(Json(ApiResponse::success(OccurrenceDto::from(&occurrence))))
}
