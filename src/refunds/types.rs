use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::refunds::breakdown::{AmountSplit, RefundBreakdown};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} status: {value}")]
pub struct UnknownStatus {
    pub kind: &'static str,
    pub value: String,
}

/// Lifecycle status of a refund request.
///
/// Declaration order is relied upon by the presentation table in the facade.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Approved,
    Processing,
    Completed,
    PartialCompleted,
    ManualReview,
    Rejected,
    Failed,
}

impl RefundStatus {
    pub const ALL: [RefundStatus; 8] = [
        RefundStatus::Pending,
        RefundStatus::Approved,
        RefundStatus::Processing,
        RefundStatus::Completed,
        RefundStatus::PartialCompleted,
        RefundStatus::ManualReview,
        RefundStatus::Rejected,
        RefundStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Pending => "pending",
            RefundStatus::Approved => "approved",
            RefundStatus::Processing => "processing",
            RefundStatus::Completed => "completed",
            RefundStatus::PartialCompleted => "partial_completed",
            RefundStatus::ManualReview => "manual_review",
            RefundStatus::Rejected => "rejected",
            RefundStatus::Failed => "failed",
        }
    }

    /// Terminal requests are immutable and no longer block a new request
    /// for the same booking.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RefundStatus::Completed | RefundStatus::Rejected | RefundStatus::Failed
        )
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RefundStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        RefundStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == value.trim().to_lowercase())
            .ok_or_else(|| UnknownStatus {
                kind: "refund",
                value: value.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    Refunded,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "refunded" => Ok(BookingStatus::Refunded),
            _ => Err(UnknownStatus {
                kind: "booking",
                value: value.to_string(),
            }),
        }
    }
}

/// Read model of a booking as seen by the refund subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub client_id: Uuid,
    pub host_id: Uuid,
    pub check_in: DateTime<Utc>,
    pub amount_paid: BigDecimal,
    pub platform_paid: BigDecimal,
    pub personal_paid: BigDecimal,
    pub status: BookingStatus,
}

impl Booking {
    pub fn amount_split(&self) -> AmountSplit {
        AmountSplit {
            amount_paid: self.amount_paid.clone(),
            platform_paid: self.platform_paid.clone(),
            personal_paid: self.personal_paid.clone(),
        }
    }

    /// Whole hours between `now` and check-in; negative once check-in has passed.
    pub fn hours_before_checkin(&self, now: DateTime<Utc>) -> i64 {
        (self.check_in - now).num_hours()
    }
}

/// One refund request tied to one booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub client_id: Uuid,
    pub host_id: Uuid,
    pub amount_paid: BigDecimal,
    pub platform_paid: BigDecimal,
    pub personal_paid: BigDecimal,
    pub reason: String,
    pub hours_before_checkin: i64,
    pub refund_percentage: BigDecimal,
    pub policy_description: String,
    pub refund_amount: BigDecimal,
    pub deduction_amount: BigDecimal,
    pub platform_refund: BigDecimal,
    pub personal_refund: BigDecimal,
    pub status: RefundStatus,
    pub refund_intent_id: Option<String>,
    pub admin_notes: Option<String>,
    pub processed_by: Option<Uuid>,
    pub processed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub personal_completed_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RefundRequest {
    /// Build a fresh `pending` request for a booking.
    pub fn new(
        booking: &Booking,
        reason: impl Into<String>,
        hours_before_checkin: i64,
        breakdown: RefundBreakdown,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            client_id: booking.client_id,
            host_id: booking.host_id,
            amount_paid: booking.amount_paid.clone(),
            platform_paid: booking.platform_paid.clone(),
            personal_paid: booking.personal_paid.clone(),
            reason: reason.into(),
            hours_before_checkin,
            refund_percentage: breakdown.refund_percentage,
            policy_description: breakdown.policy_description,
            refund_amount: breakdown.refund_amount,
            deduction_amount: breakdown.deduction_amount,
            platform_refund: breakdown.platform_refund,
            personal_refund: breakdown.personal_refund,
            status: RefundStatus::Pending,
            refund_intent_id: None,
            admin_notes: None,
            processed_by: None,
            processed_at: None,
            failure_reason: None,
            personal_completed_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn amount_split(&self) -> AmountSplit {
        AmountSplit {
            amount_paid: self.amount_paid.clone(),
            platform_paid: self.platform_paid.clone(),
            personal_paid: self.personal_paid.clone(),
        }
    }

    pub fn breakdown(&self) -> RefundBreakdown {
        RefundBreakdown {
            refund_percentage: self.refund_percentage.clone(),
            policy_description: self.policy_description.clone(),
            refund_amount: self.refund_amount.clone(),
            deduction_amount: self.deduction_amount.clone(),
            platform_refund: self.platform_refund.clone(),
            personal_refund: self.personal_refund.clone(),
        }
    }

    pub fn apply_breakdown(&mut self, breakdown: RefundBreakdown) {
        self.refund_percentage = breakdown.refund_percentage;
        self.policy_description = breakdown.policy_description;
        self.refund_amount = breakdown.refund_amount;
        self.deduction_amount = breakdown.deduction_amount;
        self.platform_refund = breakdown.platform_refund;
        self.personal_refund = breakdown.personal_refund;
    }

    /// True when part of the booking was paid directly to the host.
    pub fn has_personal_portion(&self) -> bool {
        self.personal_paid > BigDecimal::zero()
    }

    pub fn record_admin_action(&mut self, admin_id: Uuid, notes: Option<String>) {
        if let Some(notes) = notes {
            self.admin_notes = Some(match self.admin_notes.take() {
                Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, notes),
                _ => notes,
            });
        }
        self.processed_by = Some(admin_id);
        self.processed_at = Some(Utc::now());
    }
}

/// Filter and paging for refund listings. Results are newest first.
#[derive(Debug, Clone, Default)]
pub struct RefundQuery {
    pub client_id: Option<Uuid>,
    pub status: Option<RefundStatus>,
    pub page: Option<Pagination>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;

    /// Clamp user supplied paging to sane bounds.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.limit))
    }
}

#[derive(Debug, Clone, Default)]
pub struct RefundPage {
    pub items: Vec<RefundRequest>,
    pub total: u64,
}
