//! Refund Lifecycle Controller
//!
//! Owns every state change of a [`RefundRequest`]: creation from a booking,
//! admin approval and rejection, processor execution and the manual
//! completion of personal-payment portions. Writes go through the store's
//! version compare-and-swap, so two admins acting on the same request cannot
//! both win.

use crate::database::error::{DatabaseError, ACTIVE_BOOKING_CONSTRAINT};
use crate::database::repository::{BookingStore, RefundStore};
use crate::error::{AppError, AppResult, DomainError, ValidationError};
use crate::middleware::logging::log_external_call;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::RefundProcessor;
use crate::payments::types::{IntentStatus, Money, RefundIntentRequest};
use crate::refunds::{
    Booking, BookingStatus, PolicyTable, RefundBreakdown, RefundEvent, RefundPage, RefundQuery,
    RefundRequest, RefundStatus,
};
use crate::security::{ensure_admin, ensure_booking_owner, ensure_can_view, Actor};
use crate::services::notification::{NotificationDispatcher, NotificationType};
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Minimum length of a customer's cancellation reason, after trimming.
pub const MIN_REASON_LENGTH: usize = 10;
/// Minimum length of the notes recorded when a personal portion is settled.
pub const MIN_NOTES_LENGTH: usize = 10;

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Upper bound for every processor call
    pub processor_timeout: Duration,
    /// ISO currency sent to the processor
    pub currency: String,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            processor_timeout: Duration::from_secs(15),
            currency: "PHP".to_string(),
        }
    }
}

/// What the processor reported for an intent, whether answered inline or
/// delivered later by webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorOutcome {
    Succeeded,
    Failed { reason: Option<String> },
}

#[derive(Debug, Clone)]
pub enum ProcessorEventOutcome {
    /// The request left `processing` because of this event
    Applied(RefundRequest),
    /// The request already left `processing`; nothing changed
    AlreadyResolved(RefundRequest),
    /// The request is `approved` but its intent was never confirmed here;
    /// nothing changed
    NotYetConfirmed(RefundRequest),
}

/// Breakdown a booking would receive if a refund were requested now.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundPreview {
    pub booking_id: Uuid,
    pub hours_before_checkin: i64,
    pub amount_paid: BigDecimal,
    pub platform_paid: BigDecimal,
    pub personal_paid: BigDecimal,
    #[serde(flatten)]
    pub breakdown: RefundBreakdown,
}

pub struct RefundLifecycleController {
    refunds: Arc<dyn RefundStore>,
    bookings: Arc<dyn BookingStore>,
    processor: Arc<dyn RefundProcessor>,
    notifier: Arc<dyn NotificationDispatcher>,
    policy: PolicyTable,
    settings: ControllerSettings,
}

impl RefundLifecycleController {
    pub fn new(
        refunds: Arc<dyn RefundStore>,
        bookings: Arc<dyn BookingStore>,
        processor: Arc<dyn RefundProcessor>,
        notifier: Arc<dyn NotificationDispatcher>,
        policy: PolicyTable,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            refunds,
            bookings,
            processor,
            notifier,
            policy,
            settings,
        }
    }

    pub fn policy(&self) -> &PolicyTable {
        &self.policy
    }

    pub fn processor(&self) -> &Arc<dyn RefundProcessor> {
        &self.processor
    }

    // ------------------------------------------------------------------------
    // Customer operations
    // ------------------------------------------------------------------------

    /// Open a `pending` refund request for one of the actor's bookings.
    pub async fn request_refund(
        &self,
        actor: &Actor,
        booking_id: Uuid,
        reason: &str,
    ) -> AppResult<RefundRequest> {
        let reason = require_text("reason", reason, MIN_REASON_LENGTH)?;
        let booking = self.load_booking(booking_id).await?;
        ensure_booking_owner(actor, &booking)?;

        let now = Utc::now();
        self.ensure_refundable(&booking, now).await?;

        let (hours, breakdown) = self.quote(&booking, now);
        if breakdown.refund_amount.is_zero() {
            return Err(DomainError::BookingNotRefundable {
                booking_id: booking.id.to_string(),
                reason: format!(
                    "no refund under the cancellation policy ({})",
                    breakdown.policy_description
                ),
            }
            .into());
        }
        let request = RefundRequest::new(&booking, reason, hours, breakdown);

        let stored = match self.refunds.insert(&request).await {
            Ok(stored) => stored,
            Err(e) if e.is_unique_violation(ACTIVE_BOOKING_CONSTRAINT) => {
                let existing = self
                    .refunds
                    .find_active_for_booking(booking_id)
                    .await
                    .ok()
                    .flatten();
                return Err(DomainError::DuplicateRequest {
                    booking_id: booking_id.to_string(),
                    existing_refund_id: existing.map(|r| r.id.to_string()),
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            refund_id = %stored.id,
            booking_id = %stored.booking_id,
            hours_before_checkin = stored.hours_before_checkin,
            refund_amount = %stored.refund_amount,
            "Refund requested"
        );
        self.notify(
            &stored,
            &format!(
                "We received your refund request for booking {}. {}",
                stored.booking_id, stored.policy_description
            ),
        )
        .await;

        Ok(stored)
    }

    /// Compute the breakdown without persisting anything.
    pub async fn preview(&self, actor: &Actor, booking_id: Uuid) -> AppResult<RefundPreview> {
        let booking = self.load_booking(booking_id).await?;
        ensure_booking_owner(actor, &booking)?;

        let now = Utc::now();
        self.ensure_refundable(&booking, now).await?;

        let (hours_before_checkin, breakdown) = self.quote(&booking, now);
        Ok(RefundPreview {
            booking_id: booking.id,
            hours_before_checkin,
            amount_paid: booking.amount_paid,
            platform_paid: booking.platform_paid,
            personal_paid: booking.personal_paid,
            breakdown,
        })
    }

    // ------------------------------------------------------------------------
    // Admin operations
    // ------------------------------------------------------------------------

    /// Approve a pending request, optionally overriding the refund amount.
    ///
    /// A request with a platform portion gets a processor intent and moves to
    /// `approved`. One with nothing to refund through the processor goes to
    /// `manual_review`. A zero refund is refused; such a request should be
    /// rejected instead. If intent creation fails the request stays `pending`.
    pub async fn approve(
        &self,
        admin: &Actor,
        refund_id: Uuid,
        notes: Option<&str>,
        custom_amount: Option<&BigDecimal>,
    ) -> AppResult<RefundRequest> {
        ensure_admin(admin)?;
        let current = self.load_refund(refund_id).await?;

        current
            .status
            .apply(RefundEvent::Approve {
                has_platform_refund: true,
            })
            .map_err(|t| DomainError::invalid_state(current.id, t))?;

        let breakdown = match custom_amount {
            Some(amount) => RefundBreakdown::from_custom_amount(&current.amount_split(), amount)?,
            None => current.breakdown(),
        };
        if breakdown.refund_amount.is_zero() {
            return Err(ValidationError::InvalidAmount {
                amount: breakdown.refund_amount.to_string(),
                reason: "nothing to refund; reject the request instead".to_string(),
            }
            .into());
        }

        let next = current
            .status
            .apply(RefundEvent::Approve {
                has_platform_refund: breakdown.has_platform_refund(),
            })
            .map_err(|t| DomainError::invalid_state(current.id, t))?;

        let mut updated = current.clone();
        updated.apply_breakdown(breakdown);

        if next == RefundStatus::Approved {
            let request = RefundIntentRequest {
                refund_id: updated.id,
                booking_id: updated.booking_id,
                amount: Money::new(&updated.platform_refund, &self.settings.currency),
                reason: Some(updated.reason.clone()),
                idempotency_key: format!("refund-{}-v{}", updated.id, current.version),
                metadata: Some(serde_json::json!({
                    "refund_id": updated.id,
                    "client_id": updated.client_id,
                })),
            };

            let intent = log_external_call(
                "refund processor",
                "create_refund_intent",
                self.with_timeout(self.processor.create_refund_intent(request)),
            )
            .await
            .map_err(|e| {
                warn!(
                    refund_id = %current.id,
                    error = %e,
                    "Refund intent creation failed; request stays pending"
                );
                AppError::from(e)
            })?;

            info!(
                refund_id = %updated.id,
                intent_id = %intent.intent_id,
                amount = %intent.amount.amount,
                "Refund intent created"
            );
            updated.refund_intent_id = Some(intent.intent_id);
        }

        updated.status = next;
        updated.record_admin_action(admin.user_id, optional_notes(notes));

        let stored = self.save(&updated, current.version).await?;
        info!(
            refund_id = %stored.id,
            status = %stored.status,
            refund_amount = %stored.refund_amount,
            admin_id = %admin.user_id,
            "Refund approved"
        );

        let message = if stored.status == RefundStatus::ManualReview {
            "Your refund was approved and will be settled manually by our team.".to_string()
        } else {
            format!(
                "Your refund of {} was approved and will be sent shortly.",
                stored.refund_amount
            )
        };
        self.notify(&stored, &message).await;

        Ok(stored)
    }

    /// Reject a pending request. Terminal; the processor is never called.
    pub async fn reject(
        &self,
        admin: &Actor,
        refund_id: Uuid,
        notes: &str,
    ) -> AppResult<RefundRequest> {
        ensure_admin(admin)?;
        let notes = require_text("notes", notes, 1)?;
        let current = self.load_refund(refund_id).await?;

        let next = current
            .status
            .apply(RefundEvent::Reject)
            .map_err(|t| DomainError::invalid_state(current.id, t))?;

        let mut updated = current.clone();
        updated.status = next;
        updated.record_admin_action(admin.user_id, Some(notes.to_string()));

        let stored = self.save(&updated, current.version).await?;
        info!(refund_id = %stored.id, admin_id = %admin.user_id, "Refund rejected");
        self.notify(
            &stored,
            &format!("Your refund request was rejected: {}", notes),
        )
        .await;

        Ok(stored)
    }

    /// Execute an approved request's intent with the processor.
    ///
    /// The request is claimed (`processing`) before the processor is called.
    /// A processor error or timeout leaves it `failed` and is returned to the
    /// caller; there is no automatic retry. A *pending* answer leaves it in
    /// `processing` until the webhook arrives.
    pub async fn confirm_intent(&self, admin: &Actor, intent_id: &str) -> AppResult<RefundRequest> {
        ensure_admin(admin)?;
        let intent_id = intent_id.trim();
        if intent_id.is_empty() {
            return Err(ValidationError::MissingField {
                field: "refundIntentId".to_string(),
            }
            .into());
        }

        let current = self
            .refunds
            .find_by_intent(intent_id)
            .await?
            .ok_or_else(|| DomainError::IntentNotFound {
                intent_id: intent_id.to_string(),
            })?;

        let next = current
            .status
            .apply(RefundEvent::ConfirmIntent)
            .map_err(|t| DomainError::invalid_state(current.id, t))?;

        let mut claimed = current.clone();
        claimed.status = next;
        claimed.record_admin_action(admin.user_id, None);
        let claimed = self.save(&claimed, current.version).await?;
        self.notify(&claimed, "Your refund is being processed.")
            .await;

        let confirmation = match log_external_call(
            "refund processor",
            "confirm_refund_intent",
            self.with_timeout(self.processor.confirm_refund_intent(intent_id)),
        )
        .await
        {
            Ok(confirmation) => confirmation,
            Err(e) => {
                error!(
                    refund_id = %claimed.id,
                    intent_id = %intent_id,
                    error = %e,
                    "Refund intent confirmation failed; manual follow-up required"
                );
                let outcome = ProcessorOutcome::Failed {
                    reason: Some(e.to_string()),
                };
                if let Err(save_err) = self.finish(claimed, outcome).await {
                    error!(intent_id = %intent_id, error = %save_err, "Failed to record refund failure");
                }
                return Err(e.into());
            }
        };

        match confirmation.status {
            IntentStatus::Succeeded => self.finish(claimed, ProcessorOutcome::Succeeded).await,
            IntentStatus::Failed | IntentStatus::Cancelled => {
                self.finish(
                    claimed,
                    ProcessorOutcome::Failed {
                        reason: confirmation.failure_reason.or_else(|| {
                            Some("processor did not complete the refund intent".to_string())
                        }),
                    },
                )
                .await
            }
            IntentStatus::Processing | IntentStatus::RequiresConfirmation => {
                info!(
                    refund_id = %claimed.id,
                    intent_id = %intent_id,
                    "Processor accepted the intent; awaiting callback"
                );
                Ok(claimed)
            }
        }
    }

    /// Record that the personal-payment portion was settled outside the
    /// processor.
    pub async fn complete_personal(
        &self,
        admin: &Actor,
        refund_id: Uuid,
        notes: &str,
    ) -> AppResult<RefundRequest> {
        ensure_admin(admin)?;
        let notes = require_text("notes", notes, MIN_NOTES_LENGTH)?;
        let current = self.load_refund(refund_id).await?;

        let next = current
            .status
            .apply(RefundEvent::CompletePersonal)
            .map_err(|t| DomainError::invalid_state(current.id, t))?;

        let mut updated = current.clone();
        updated.status = next;
        updated.personal_completed_at = Some(Utc::now());
        updated.record_admin_action(admin.user_id, Some(notes.to_string()));

        let stored = self.save(&updated, current.version).await?;
        info!(
            refund_id = %stored.id,
            admin_id = %admin.user_id,
            personal_refund = %stored.personal_refund,
            "Personal refund portion completed"
        );
        self.mark_booking_refunded(&stored).await;
        self.notify(&stored, "Your refund has been completed in full.")
            .await;

        Ok(stored)
    }

    // ------------------------------------------------------------------------
    // Processor callbacks
    // ------------------------------------------------------------------------

    /// Apply an asynchronous processor outcome. Requests that already left
    /// `processing` are returned untouched.
    pub async fn apply_processor_event(
        &self,
        intent_id: &str,
        outcome: ProcessorOutcome,
    ) -> AppResult<ProcessorEventOutcome> {
        let current = self
            .refunds
            .find_by_intent(intent_id)
            .await?
            .ok_or_else(|| DomainError::IntentNotFound {
                intent_id: intent_id.to_string(),
            })?;

        match current.status {
            RefundStatus::Processing => {}
            RefundStatus::Approved => {
                warn!(
                    refund_id = %current.id,
                    intent_id = %intent_id,
                    "Processor event for an intent not yet confirmed; ignored"
                );
                return Ok(ProcessorEventOutcome::NotYetConfirmed(current));
            }
            status => {
                info!(
                    refund_id = %current.id,
                    intent_id = %intent_id,
                    status = %status,
                    "Processor event ignored; refund already resolved"
                );
                return Ok(ProcessorEventOutcome::AlreadyResolved(current));
            }
        }

        self.finish(current, outcome)
            .await
            .map(ProcessorEventOutcome::Applied)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub async fn get(&self, actor: &Actor, refund_id: Uuid) -> AppResult<RefundRequest> {
        let refund = self.load_refund(refund_id).await?;
        ensure_can_view(actor, &refund)?;
        Ok(refund)
    }

    /// The actor's own requests, newest first.
    pub async fn list_mine(
        &self,
        actor: &Actor,
        status: Option<RefundStatus>,
    ) -> AppResult<Vec<RefundRequest>> {
        let page = self
            .refunds
            .list(&RefundQuery {
                client_id: Some(actor.user_id),
                status,
                page: None,
            })
            .await?;
        Ok(page.items)
    }

    pub async fn list_all(&self, admin: &Actor, query: &RefundQuery) -> AppResult<RefundPage> {
        ensure_admin(admin)?;
        Ok(self.refunds.list(query).await?)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    async fn finish(
        &self,
        current: RefundRequest,
        outcome: ProcessorOutcome,
    ) -> AppResult<RefundRequest> {
        let event = match &outcome {
            ProcessorOutcome::Succeeded => RefundEvent::ProcessorSucceeded {
                has_personal_portion: current.has_personal_portion(),
            },
            ProcessorOutcome::Failed { .. } => RefundEvent::ProcessorFailed,
        };
        let next = current
            .status
            .apply(event)
            .map_err(|t| DomainError::invalid_state(current.id, t))?;

        let mut updated = current.clone();
        updated.status = next;
        if let ProcessorOutcome::Failed { reason } = outcome {
            updated.failure_reason = reason;
        }

        let stored = match self.refunds.update(&updated, current.version).await {
            Ok(stored) => stored,
            Err(e) if e.is_version_conflict() => {
                // The inline answer and the webhook can race; whichever lands
                // second sees the other's result.
                if let Some(latest) = self.refunds.find_by_id(current.id).await? {
                    if latest.status != current.status {
                        info!(
                            refund_id = %latest.id,
                            status = %latest.status,
                            "Processor outcome already recorded"
                        );
                        return Ok(latest);
                    }
                }
                warn!(
                    refund_id = %current.id,
                    expected_version = current.version,
                    "Refund modified concurrently"
                );
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };
        info!(
            refund_id = %stored.id,
            status = %stored.status,
            platform_refund = %stored.platform_refund,
            "Processor outcome applied"
        );

        let message = match stored.status {
            RefundStatus::Completed => {
                self.mark_booking_refunded(&stored).await;
                format!("Your refund of {} has been completed.", stored.refund_amount)
            }
            RefundStatus::PartialCompleted => format!(
                "{} was refunded to you. The remaining {} paid to the host is being settled.",
                stored.platform_refund, stored.personal_refund
            ),
            _ => "We could not complete your refund. Our team will follow up.".to_string(),
        };
        self.notify(&stored, &message).await;

        Ok(stored)
    }

    fn quote(&self, booking: &Booking, now: DateTime<Utc>) -> (i64, RefundBreakdown) {
        let hours = booking.hours_before_checkin(now);
        let decision = self.policy.lookup(hours);
        let breakdown = RefundBreakdown::from_percentage(
            &booking.amount_split(),
            &BigDecimal::from(decision.percentage),
            decision.description,
        );
        (hours, breakdown)
    }

    async fn ensure_refundable(&self, booking: &Booking, now: DateTime<Utc>) -> AppResult<()> {
        let not_refundable = |reason: &str| -> AppError {
            DomainError::BookingNotRefundable {
                booking_id: booking.id.to_string(),
                reason: reason.to_string(),
            }
            .into()
        };

        match booking.status {
            BookingStatus::Confirmed => {}
            BookingStatus::Refunded => {
                return Err(not_refundable("booking has already been refunded"))
            }
            other => {
                return Err(not_refundable(&format!("booking is {}", other.as_str())));
            }
        }
        if booking.amount_paid <= BigDecimal::zero() {
            return Err(not_refundable("nothing was paid for this booking"));
        }
        if !booking.amount_split().is_consistent() {
            return Err(not_refundable("payment split does not add up to the amount paid"));
        }
        if booking.check_in <= now {
            return Err(not_refundable("check-in has already passed"));
        }

        let history = self.refunds.find_by_booking(booking.id).await?;
        if history.iter().any(|r| r.status == RefundStatus::Completed) {
            return Err(not_refundable("booking has already been refunded"));
        }
        if let Some(active) = history.iter().find(|r| r.status.is_active()) {
            return Err(DomainError::DuplicateRequest {
                booking_id: booking.id.to_string(),
                existing_refund_id: Some(active.id.to_string()),
            }
            .into());
        }
        Ok(())
    }

    async fn load_booking(&self, booking_id: Uuid) -> AppResult<Booking> {
        self.bookings
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| {
                DomainError::BookingNotFound {
                    booking_id: booking_id.to_string(),
                }
                .into()
            })
    }

    async fn load_refund(&self, refund_id: Uuid) -> AppResult<RefundRequest> {
        self.refunds.find_by_id(refund_id).await?.ok_or_else(|| {
            DomainError::RefundNotFound {
                refund_id: refund_id.to_string(),
            }
            .into()
        })
    }

    async fn save(&self, request: &RefundRequest, expected_version: i64) -> AppResult<RefundRequest> {
        self.refunds
            .update(request, expected_version)
            .await
            .map_err(|e: DatabaseError| {
                if e.is_version_conflict() {
                    warn!(
                        refund_id = %request.id,
                        expected_version,
                        "Refund modified concurrently"
                    );
                }
                e.into()
            })
    }

    async fn with_timeout<T, F>(&self, call: F) -> PaymentResult<T>
    where
        F: Future<Output = PaymentResult<T>>,
    {
        let limit = self.settings.processor_timeout;
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(PaymentError::Timeout {
                timeout_secs: limit.as_secs().max(1),
            }),
        }
    }

    async fn mark_booking_refunded(&self, refund: &RefundRequest) {
        if let Err(e) = self.bookings.mark_refunded(refund.booking_id).await {
            warn!(
                refund_id = %refund.id,
                booking_id = %refund.booking_id,
                error = %e,
                "Failed to mark booking as refunded"
            );
        }
    }

    async fn notify(&self, refund: &RefundRequest, message: &str) {
        let notification_type = NotificationType::for_status(refund.status);
        if let Err(e) = self
            .notifier
            .notify(refund, notification_type, message)
            .await
        {
            warn!(refund_id = %refund.id, error = %e, "Refund notification failed");
        }
    }
}

/// Trimmed `value`, or a validation error when it is shorter than `min`.
fn require_text<'a>(field: &str, value: &'a str, min: usize) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField {
            field: field.to_string(),
        });
    }
    if trimmed.chars().count() < min {
        return Err(ValidationError::TooShort {
            field: field.to_string(),
            min,
        });
    }
    Ok(trimmed)
}

fn optional_notes(notes: Option<&str>) -> Option<String> {
    notes
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}
