use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    Json,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::auth::Caller;
use super::{parse_status, RefundApiState};
use crate::error::{AppError, ValidationError};
use crate::refunds::{Pagination, RefundQuery};
use crate::security::ensure_admin;
use crate::services::{RefundStatistics, RefundView};

#[derive(Debug, Deserialize)]
pub struct AdminListQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessAction {
    Approve,
    Reject,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRefundBody {
    pub action: ProcessAction,
    pub notes: Option<String>,
    pub custom_amount: Option<BigDecimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmIntentBody {
    pub refund_intent_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CompletePersonalBody {
    pub notes: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Serialize)]
pub struct AdminRefundList {
    pub refunds: Vec<RefundView>,
    pub pagination: PaginationInfo,
    pub statistics: RefundStatistics,
}

/// GET /admin/refunds?status=&page=&limit=
pub async fn list_refunds(
    State(state): State<RefundApiState>,
    caller: Caller,
    query: Result<Query<AdminListQuery>, QueryRejection>,
) -> Result<Json<AdminRefundList>, AppError> {
    ensure_admin(&caller.actor).map_err(|e| caller.tag(e.into()))?;
    let Query(query) = query.map_err(|e| caller.tag(e.into()))?;

    let pagination = Pagination::new(query.page, query.limit);
    let refund_query = RefundQuery {
        client_id: None,
        status: parse_status(query.status.as_deref()).map_err(|e| caller.tag(e))?,
        page: Some(pagination),
    };

    let page = state
        .controller
        .list_all(&caller.actor, &refund_query)
        .await
        .map_err(|e| caller.tag(e))?;
    let statistics = state
        .statistics(&caller.actor)
        .await
        .map_err(|e| caller.tag(e))?;

    Ok(Json(AdminRefundList {
        refunds: state.facade.views(&page.items),
        pagination: PaginationInfo {
            page: pagination.page,
            limit: pagination.limit,
            total: page.total,
            total_pages: pagination.total_pages(page.total),
        },
        statistics,
    }))
}

/// GET /admin/refunds/{id}
pub async fn get_refund(
    State(state): State<RefundApiState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<RefundView>, AppError> {
    ensure_admin(&caller.actor).map_err(|e| caller.tag(e.into()))?;
    let refund = state
        .controller
        .get(&caller.actor, id)
        .await
        .map_err(|e| caller.tag(e))?;
    Ok(Json(state.facade.view(&refund)))
}

/// POST /admin/refunds/{id}/process
pub async fn process_refund(
    State(state): State<RefundApiState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    body: Result<Json<ProcessRefundBody>, JsonRejection>,
) -> Result<Json<RefundView>, AppError> {
    let Json(body) = body.map_err(|e| caller.tag(e.into()))?;
    info!(refund_id = %id, action = ?body.action, admin_id = %caller.actor.user_id, "Processing refund");

    let result = match body.action {
        ProcessAction::Approve => {
            state
                .controller
                .approve(
                    &caller.actor,
                    id,
                    body.notes.as_deref(),
                    body.custom_amount.as_ref(),
                )
                .await
        }
        ProcessAction::Reject => {
            if body.custom_amount.is_some() {
                return Err(caller.tag(
                    ValidationError::InvalidFormat {
                        field: "customAmount".to_string(),
                        reason: "only allowed when approving".to_string(),
                    }
                    .into(),
                ));
            }
            state
                .controller
                .reject(&caller.actor, id, body.notes.as_deref().unwrap_or_default())
                .await
        }
    };

    let refund = result.map_err(|e| caller.tag(e))?;
    state.invalidate_statistics().await;
    Ok(Json(state.facade.view(&refund)))
}

/// POST /admin/refunds/confirm-intent
pub async fn confirm_intent(
    State(state): State<RefundApiState>,
    caller: Caller,
    body: Result<Json<ConfirmIntentBody>, JsonRejection>,
) -> Result<Json<RefundView>, AppError> {
    let Json(body) = body.map_err(|e| caller.tag(e.into()))?;

    let result = state
        .controller
        .confirm_intent(&caller.actor, &body.refund_intent_id)
        .await;
    // A failed confirmation still changed the request.
    state.invalidate_statistics().await;

    let refund = result.map_err(|e| caller.tag(e))?;
    Ok(Json(state.facade.view(&refund)))
}

/// POST /admin/refunds/{id}/complete-personal
pub async fn complete_personal(
    State(state): State<RefundApiState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    body: Result<Json<CompletePersonalBody>, JsonRejection>,
) -> Result<Json<RefundView>, AppError> {
    let Json(body) = body.map_err(|e| caller.tag(e.into()))?;

    let refund = state
        .controller
        .complete_personal(&caller.actor, id, &body.notes)
        .await
        .map_err(|e| caller.tag(e))?;
    state.invalidate_statistics().await;
    Ok(Json(state.facade.view(&refund)))
}
