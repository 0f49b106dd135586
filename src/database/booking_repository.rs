use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::database::repository::BookingStore;
use crate::refunds::{Booking, BookingStatus};

#[derive(Debug, Clone, FromRow)]
struct BookingRow {
    id: Uuid,
    client_id: Uuid,
    host_id: Uuid,
    check_in: DateTime<Utc>,
    amount_paid: BigDecimal,
    platform_paid: BigDecimal,
    personal_paid: BigDecimal,
    status: String,
}

impl TryFrom<BookingRow> for Booking {
    type Error = DatabaseError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status: BookingStatus = row.status.parse().map_err(|e| {
            DatabaseError::new(DatabaseErrorKind::CorruptRow {
                message: format!("booking {}: {}", row.id, e),
            })
        })?;

        Ok(Booking {
            id: row.id,
            client_id: row.client_id,
            host_id: row.host_id,
            check_in: row.check_in,
            amount_paid: row.amount_paid,
            platform_paid: row.platform_paid,
            personal_paid: row.personal_paid,
            status,
        })
    }
}

/// Read access to the booking system of record
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, DatabaseError> {
        sqlx::query_as::<_, BookingRow>(
            "SELECT id, client_id, host_id, check_in, amount_paid, platform_paid, personal_paid, status
             FROM bookings
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .map(Booking::try_from)
        .transpose()
    }

    async fn mark_refunded(&self, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE bookings SET status = 'refunded', updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("booking", id));
        }
        Ok(())
    }
}
