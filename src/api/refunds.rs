use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::auth::Caller;
use super::{parse_status, RefundApiState};
use crate::error::AppError;
use crate::services::{RefundPreview, RefundView};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRefundBody {
    pub booking_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewQuery {
    pub booking_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct RefundListResponse {
    pub refunds: Vec<RefundView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    #[serde(flatten)]
    pub preview: RefundPreview,
    pub formatted_refund_amount: String,
    pub formatted_deduction_amount: String,
}

/// POST /refunds
pub async fn create_refund(
    State(state): State<RefundApiState>,
    caller: Caller,
    body: Result<Json<CreateRefundBody>, JsonRejection>,
) -> Result<(StatusCode, Json<RefundView>), AppError> {
    let Json(body) = body.map_err(|e| caller.tag(e.into()))?;
    info!(booking_id = %body.booking_id, user_id = %caller.actor.user_id, "Refund request received");

    let refund = state
        .controller
        .request_refund(&caller.actor, body.booking_id, &body.reason)
        .await
        .map_err(|e| caller.tag(e))?;
    state.invalidate_statistics().await;

    Ok((StatusCode::CREATED, Json(state.facade.view(&refund))))
}

/// GET /refunds/mine?status=
pub async fn list_my_refunds(
    State(state): State<RefundApiState>,
    caller: Caller,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Json<RefundListResponse>, AppError> {
    let Query(query) = query.map_err(|e| caller.tag(e.into()))?;
    let status = parse_status(query.status.as_deref()).map_err(|e| caller.tag(e))?;

    let refunds = state
        .controller
        .list_mine(&caller.actor, status)
        .await
        .map_err(|e| caller.tag(e))?;

    Ok(Json(RefundListResponse {
        refunds: state.facade.views(&refunds),
    }))
}

/// GET /refunds/preview?bookingId=
pub async fn preview_refund(
    State(state): State<RefundApiState>,
    caller: Caller,
    query: Result<Query<PreviewQuery>, QueryRejection>,
) -> Result<Json<PreviewResponse>, AppError> {
    let Query(query) = query.map_err(|e| caller.tag(e.into()))?;
    let preview = state
        .controller
        .preview(&caller.actor, query.booking_id)
        .await
        .map_err(|e| caller.tag(e))?;

    Ok(Json(PreviewResponse {
        formatted_refund_amount: state.facade.format(&preview.breakdown.refund_amount),
        formatted_deduction_amount: state.facade.format(&preview.breakdown.deduction_amount),
        preview,
    }))
}

/// GET /refunds/{id}
pub async fn get_refund(
    State(state): State<RefundApiState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<RefundView>, AppError> {
    let refund = state
        .controller
        .get(&caller.actor, id)
        .await
        .map_err(|e| caller.tag(e))?;
    Ok(Json(state.facade.view(&refund)))
}
