//! In-memory stores used by tests and by `SKIP_EXTERNALS` runs.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::error::{DatabaseError, DatabaseErrorKind, ACTIVE_BOOKING_CONSTRAINT};
use crate::database::repository::{BookingStore, RefundStore};
use crate::refunds::{Booking, BookingStatus, RefundPage, RefundQuery, RefundRequest};

#[derive(Debug, Default)]
pub struct MemoryRefundStore {
    rows: RwLock<HashMap<Uuid, RefundRequest>>,
}

impl MemoryRefundStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

fn newest_first(items: &mut [RefundRequest]) {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl RefundStore for MemoryRefundStore {
    async fn insert(&self, request: &RefundRequest) -> Result<RefundRequest, DatabaseError> {
        let mut rows = self.rows.write().await;

        if rows.contains_key(&request.id) {
            return Err(DatabaseError::new(DatabaseErrorKind::UniqueViolation {
                constraint: "refund_requests_pkey".to_string(),
            }));
        }
        let has_active = rows
            .values()
            .any(|r| r.booking_id == request.booking_id && r.status.is_active());
        if request.status.is_active() && has_active {
            return Err(DatabaseError::new(DatabaseErrorKind::UniqueViolation {
                constraint: ACTIVE_BOOKING_CONSTRAINT.to_string(),
            }));
        }

        rows.insert(request.id, request.clone());
        Ok(request.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<RefundRequest>, DatabaseError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn find_by_intent(
        &self,
        intent_id: &str,
    ) -> Result<Option<RefundRequest>, DatabaseError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|r| r.refund_intent_id.as_deref() == Some(intent_id))
            .cloned())
    }

    async fn find_active_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<RefundRequest>, DatabaseError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|r| r.booking_id == booking_id && r.status.is_active())
            .cloned())
    }

    async fn find_by_booking(&self, booking_id: Uuid) -> Result<Vec<RefundRequest>, DatabaseError> {
        let mut items: Vec<_> = self
            .rows
            .read()
            .await
            .values()
            .filter(|r| r.booking_id == booking_id)
            .cloned()
            .collect();
        newest_first(&mut items);
        Ok(items)
    }

    async fn list(&self, query: &RefundQuery) -> Result<RefundPage, DatabaseError> {
        let mut items: Vec<_> = self
            .rows
            .read()
            .await
            .values()
            .filter(|r| query.client_id.is_none_or(|id| r.client_id == id))
            .filter(|r| query.status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        newest_first(&mut items);

        let total = items.len() as u64;
        let items = match query.page {
            Some(page) => items
                .into_iter()
                .skip(page.offset() as usize)
                .take(page.limit as usize)
                .collect(),
            None => items,
        };

        Ok(RefundPage { items, total })
    }

    async fn update(
        &self,
        request: &RefundRequest,
        expected_version: i64,
    ) -> Result<RefundRequest, DatabaseError> {
        let mut rows = self.rows.write().await;
        let stored = rows
            .get_mut(&request.id)
            .ok_or_else(|| DatabaseError::not_found("refund_request", request.id))?;

        if stored.version != expected_version {
            return Err(DatabaseError::version_conflict(
                "refund_request",
                request.id,
                expected_version,
            ));
        }

        let mut next = request.clone();
        next.version = expected_version + 1;
        next.updated_at = Utc::now();
        *stored = next.clone();
        Ok(next)
    }
}

#[derive(Debug, Default)]
pub struct MemoryBookingStore {
    rows: RwLock<HashMap<Uuid, Booking>>,
}

impl MemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_booking(&self, booking: Booking) {
        self.rows.write().await.insert(booking.id, booking);
    }
}

#[async_trait]
impl BookingStore for MemoryBookingStore {
    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, DatabaseError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn mark_refunded(&self, id: Uuid) -> Result<(), DatabaseError> {
        let mut rows = self.rows.write().await;
        let booking = rows
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::not_found("booking", id))?;
        booking.status = BookingStatus::Refunded;
        Ok(())
    }
}
