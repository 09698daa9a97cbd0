use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{RefundChanges, RefundInput, RefundRequest, RefundStatus},
    error::Result,
};

const MAX_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    refunds: Vec<RefundRequest>,
    total: i64,
}

/// What create and update calls echo back: the writable fields plus `id`.
#[derive(Debug, Serialize)]
pub struct RefundDto {
    id: i64,
    #[serde(flatten)]
    input: RefundInput,
}

impl From<RefundRequest> for RefundDto {
    fn from(refund: RefundRequest) -> Self {
        Self {
            id: refund.id,
            input: refund.to_input(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReplaceRefundDto {
    #[serde(flatten)]
    input: RefundInput,
    #[serde(default)]
    status: Option<RefundStatus>,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>> {
    let limit = params.limit.clamp(1, MAX_LIMIT);
    let offset = params.offset.max(0);

    let (refunds, total) = state.service_context.refund_service
        .list_visible(&current.user, limit, offset)
        .await?;

    Ok(Json(ListResponse { refunds, total }))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<RefundRequest>> {
    let refund = state.service_context.refund_service
        .get_for(&current.user, id)
        .await?;

    Ok(Json(refund))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    payload: std::result::Result<Json<RefundInput>, JsonRejection>,
) -> Result<(StatusCode, Json<RefundDto>)> {
    let Json(input) = payload?;

    let refund = state.service_context.refund_service
        .submit(&current.user, input)
        .await?;

    Ok((StatusCode::CREATED, Json(refund.into())))
}

pub async fn replace(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    payload: std::result::Result<Json<ReplaceRefundDto>, JsonRejection>,
) -> Result<Json<RefundDto>> {
    let Json(dto) = payload?;

    let refund = state.service_context.refund_service
        .update(&current.user, id, RefundChanges::replace_with(dto.input, dto.status))
        .await?;

    Ok(Json(refund.into()))
}

pub async fn patch(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    payload: std::result::Result<Json<RefundChanges>, JsonRejection>,
) -> Result<Json<RefundDto>> {
    let Json(changes) = payload?;

    let refund = state.service_context.refund_service
        .update(&current.user, id, changes)
        .await?;

    Ok(Json(refund.into()))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.service_context.refund_service
        .delete(&current.user, id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
