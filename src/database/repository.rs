//! Storage seams for the refund service.
//!
//! Both traits have an in-memory implementation (`database::memory`) and a
//! Postgres implementation behind the `database` feature.

use async_trait::async_trait;
use uuid::Uuid;

use crate::database::error::DatabaseError;
use crate::refunds::{Booking, RefundPage, RefundQuery, RefundRequest};

#[async_trait]
pub trait RefundStore: Send + Sync {
    /// Persist a new request. Fails with a unique violation on
    /// [`ACTIVE_BOOKING_CONSTRAINT`](crate::database::error::ACTIVE_BOOKING_CONSTRAINT)
    /// when the booking already has an active request.
    async fn insert(&self, request: &RefundRequest) -> Result<RefundRequest, DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<RefundRequest>, DatabaseError>;

    async fn find_by_intent(&self, intent_id: &str)
        -> Result<Option<RefundRequest>, DatabaseError>;

    /// The booking's non-terminal request, if any.
    async fn find_active_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<RefundRequest>, DatabaseError>;

    /// Every request ever made for the booking, newest first.
    async fn find_by_booking(&self, booking_id: Uuid) -> Result<Vec<RefundRequest>, DatabaseError>;

    async fn list(&self, query: &RefundQuery) -> Result<RefundPage, DatabaseError>;

    /// Write `request` if the stored row is still at `expected_version`.
    ///
    /// Returns the stored row with `version = expected_version + 1`.
    async fn update(
        &self,
        request: &RefundRequest,
        expected_version: i64,
    ) -> Result<RefundRequest, DatabaseError>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, DatabaseError>;

    async fn mark_refunded(&self, id: Uuid) -> Result<(), DatabaseError>;
}
