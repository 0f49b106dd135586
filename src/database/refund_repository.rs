use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::database::repository::RefundStore;
use crate::refunds::{RefundPage, RefundQuery, RefundRequest, RefundStatus};

const REFUND_COLUMNS: &str = "id, booking_id, client_id, host_id, amount_paid, platform_paid, \
     personal_paid, reason, hours_before_checkin, refund_percentage, policy_description, \
     refund_amount, deduction_amount, platform_refund, personal_refund, status, \
     refund_intent_id, admin_notes, processed_by, processed_at, failure_reason, \
     personal_completed_at, version, created_at, updated_at";

/// Row shape of `refund_requests`; `status` is stored as text.
#[derive(Debug, Clone, FromRow)]
struct RefundRow {
    id: Uuid,
    booking_id: Uuid,
    client_id: Uuid,
    host_id: Uuid,
    amount_paid: BigDecimal,
    platform_paid: BigDecimal,
    personal_paid: BigDecimal,
    reason: String,
    hours_before_checkin: i64,
    refund_percentage: BigDecimal,
    policy_description: String,
    refund_amount: BigDecimal,
    deduction_amount: BigDecimal,
    platform_refund: BigDecimal,
    personal_refund: BigDecimal,
    status: String,
    refund_intent_id: Option<String>,
    admin_notes: Option<String>,
    processed_by: Option<Uuid>,
    processed_at: Option<DateTime<Utc>>,
    failure_reason: Option<String>,
    personal_completed_at: Option<DateTime<Utc>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RefundRow> for RefundRequest {
    type Error = DatabaseError;

    fn try_from(row: RefundRow) -> Result<Self, Self::Error> {
        let status: RefundStatus = row.status.parse().map_err(|e| {
            DatabaseError::new(DatabaseErrorKind::CorruptRow {
                message: format!("refund_request {}: {}", row.id, e),
            })
        })?;

        Ok(RefundRequest {
            id: row.id,
            booking_id: row.booking_id,
            client_id: row.client_id,
            host_id: row.host_id,
            amount_paid: row.amount_paid,
            platform_paid: row.platform_paid,
            personal_paid: row.personal_paid,
            reason: row.reason,
            hours_before_checkin: row.hours_before_checkin,
            refund_percentage: row.refund_percentage,
            policy_description: row.policy_description,
            refund_amount: row.refund_amount,
            deduction_amount: row.deduction_amount,
            platform_refund: row.platform_refund,
            personal_refund: row.personal_refund,
            status,
            refund_intent_id: row.refund_intent_id,
            admin_notes: row.admin_notes,
            processed_by: row.processed_by,
            processed_at: row.processed_at,
            failure_reason: row.failure_reason,
            personal_completed_at: row.personal_completed_at,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_requests(rows: Vec<RefundRow>) -> Result<Vec<RefundRequest>, DatabaseError> {
    rows.into_iter().map(RefundRequest::try_from).collect()
}

/// Postgres-backed refund store
pub struct PgRefundStore {
    pool: PgPool,
}

impl PgRefundStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefundStore for PgRefundStore {
    async fn insert(&self, request: &RefundRequest) -> Result<RefundRequest, DatabaseError> {
        let sql = format!(
            "INSERT INTO refund_requests ({cols}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
                     $17, $18, $19, $20, $21, $22, $23, $24, $25) \
             RETURNING {cols}",
            cols = REFUND_COLUMNS
        );

        let row = sqlx::query_as::<_, RefundRow>(&sql)
            .bind(request.id)
            .bind(request.booking_id)
            .bind(request.client_id)
            .bind(request.host_id)
            .bind(&request.amount_paid)
            .bind(&request.platform_paid)
            .bind(&request.personal_paid)
            .bind(&request.reason)
            .bind(request.hours_before_checkin)
            .bind(&request.refund_percentage)
            .bind(&request.policy_description)
            .bind(&request.refund_amount)
            .bind(&request.deduction_amount)
            .bind(&request.platform_refund)
            .bind(&request.personal_refund)
            .bind(request.status.as_str())
            .bind(&request.refund_intent_id)
            .bind(&request.admin_notes)
            .bind(request.processed_by)
            .bind(request.processed_at)
            .bind(&request.failure_reason)
            .bind(request.personal_completed_at)
            .bind(request.version)
            .bind(request.created_at)
            .bind(request.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        row.try_into()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<RefundRequest>, DatabaseError> {
        let sql = format!("SELECT {} FROM refund_requests WHERE id = $1", REFUND_COLUMNS);
        sqlx::query_as::<_, RefundRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?
            .map(RefundRequest::try_from)
            .transpose()
    }

    async fn find_by_intent(
        &self,
        intent_id: &str,
    ) -> Result<Option<RefundRequest>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM refund_requests WHERE refund_intent_id = $1",
            REFUND_COLUMNS
        );
        sqlx::query_as::<_, RefundRow>(&sql)
            .bind(intent_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?
            .map(RefundRequest::try_from)
            .transpose()
    }

    async fn find_active_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<RefundRequest>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM refund_requests \
             WHERE booking_id = $1 AND status NOT IN ('completed', 'rejected', 'failed')",
            REFUND_COLUMNS
        );
        sqlx::query_as::<_, RefundRow>(&sql)
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?
            .map(RefundRequest::try_from)
            .transpose()
    }

    async fn find_by_booking(&self, booking_id: Uuid) -> Result<Vec<RefundRequest>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM refund_requests WHERE booking_id = $1 ORDER BY created_at DESC, id DESC",
            REFUND_COLUMNS
        );
        let rows = sqlx::query_as::<_, RefundRow>(&sql)
            .bind(booking_id)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        into_requests(rows)
    }

    async fn list(&self, query: &RefundQuery) -> Result<RefundPage, DatabaseError> {
        let status = query.status.map(|s| s.as_str());
        let (limit, offset) = match query.page {
            Some(page) => (Some(i64::from(page.limit)), page.offset() as i64),
            None => (None, 0),
        };

        let sql = format!(
            "SELECT {} FROM refund_requests \
             WHERE ($1::uuid IS NULL OR client_id = $1) \
               AND ($2::text IS NULL OR status = $2) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3 OFFSET $4",
            REFUND_COLUMNS
        );
        let rows = sqlx::query_as::<_, RefundRow>(&sql)
            .bind(query.client_id)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM refund_requests \
             WHERE ($1::uuid IS NULL OR client_id = $1) \
               AND ($2::text IS NULL OR status = $2)",
        )
        .bind(query.client_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(RefundPage {
            items: into_requests(rows)?,
            total: total.max(0) as u64,
        })
    }

    async fn update(
        &self,
        request: &RefundRequest,
        expected_version: i64,
    ) -> Result<RefundRequest, DatabaseError> {
        let sql = format!(
            "UPDATE refund_requests SET \
                 refund_percentage = $3, policy_description = $4, refund_amount = $5, \
                 deduction_amount = $6, platform_refund = $7, personal_refund = $8, \
                 status = $9, refund_intent_id = $10, admin_notes = $11, processed_by = $12, \
                 processed_at = $13, failure_reason = $14, personal_completed_at = $15, \
                 version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND version = $2 \
             RETURNING {}",
            REFUND_COLUMNS
        );

        let row = sqlx::query_as::<_, RefundRow>(&sql)
            .bind(request.id)
            .bind(expected_version)
            .bind(&request.refund_percentage)
            .bind(&request.policy_description)
            .bind(&request.refund_amount)
            .bind(&request.deduction_amount)
            .bind(&request.platform_refund)
            .bind(&request.personal_refund)
            .bind(request.status.as_str())
            .bind(&request.refund_intent_id)
            .bind(&request.admin_notes)
            .bind(request.processed_by)
            .bind(request.processed_at)
            .bind(&request.failure_reason)
            .bind(request.personal_completed_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        match row {
            Some(row) => row.try_into(),
            None => {
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM refund_requests WHERE id = $1)")
                        .bind(request.id)
                        .fetch_one(&self.pool)
                        .await
                        .map_err(DatabaseError::from_sqlx)?;
                if exists {
                    Err(DatabaseError::version_conflict(
                        "refund_request",
                        request.id,
                        expected_version,
                    ))
                } else {
                    Err(DatabaseError::not_found("refund_request", request.id))
                }
            }
        }
    }
}
