//! End-to-end lifecycle scenarios against the in-memory stores and the
//! sandbox processor.
//!
//! Tests cover:
//! - Full platform refund through the processor
//! - Split payments finished by manual settlement
//! - Rejection and the terminal states
//! - Amount invariants of every created request
//! - Optimistic concurrency between two administrators

mod support;

use bigdecimal::{BigDecimal, Zero};
use std::time::Duration;

use rental_refunds::database::{BookingStore, RefundStore};
use rental_refunds::error::ErrorCode;
use rental_refunds::payments::providers::SandboxBehaviour;
use rental_refunds::payments::IntentStatus;
use rental_refunds::refunds::{BookingStatus, RefundStatus};
use rental_refunds::security::Actor;
use uuid::Uuid;
use support::{dec, TestContext, REASON};

#[tokio::test]
async fn full_platform_refund_completes_through_processor() {
    let ctx = TestContext::new();
    // 4 days out: 80% tier
    let booking = ctx.booking(96, "10000", "0").await;

    let refund = ctx
        .controller
        .request_refund(&ctx.client, booking.id, REASON)
        .await
        .unwrap();
    assert_eq!(refund.status, RefundStatus::Pending);
    assert_eq!(refund.refund_amount, dec("8000"));
    assert_eq!(refund.deduction_amount, dec("2000"));
    assert_eq!(refund.platform_refund, dec("8000"));
    assert_eq!(refund.personal_refund, BigDecimal::zero());

    let approved = ctx
        .controller
        .approve(&ctx.admin, refund.id, Some("Within policy"), None)
        .await
        .unwrap();
    assert_eq!(approved.status, RefundStatus::Approved);
    let intent_id = approved.refund_intent_id.clone().unwrap();
    assert_eq!(approved.processed_by, Some(ctx.admin.user_id));

    let sent = ctx.sandbox.intent_request(&intent_id).unwrap();
    assert_eq!(sent.amount.currency, "PHP");
    assert_eq!(dec(&sent.amount.amount), dec("8000"));

    let completed = ctx
        .controller
        .confirm_intent(&ctx.admin, &intent_id)
        .await
        .unwrap();
    assert_eq!(completed.status, RefundStatus::Completed);
    assert_eq!(
        ctx.sandbox.intent_status(&intent_id),
        Some(IntentStatus::Succeeded)
    );

    let stored_booking = ctx.bookings.find_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(stored_booking.status, BookingStatus::Refunded);
}

#[tokio::test]
async fn split_payment_needs_manual_settlement_of_personal_portion() {
    let ctx = TestContext::new();
    let booking = ctx.booking(96, "6000", "4000").await;

    let refund = ctx
        .controller
        .request_refund(&ctx.client, booking.id, REASON)
        .await
        .unwrap();
    // The refund follows the payment split: 80% of the 6000 platform part and
    // 80% of the 4000 personal part. Allocating platform-first (6400/1600)
    // would return more through the processor than was paid through it.
    assert_eq!(refund.amount_paid, dec("10000"));
    assert_eq!(refund.platform_paid, dec("6000"));
    assert_eq!(refund.personal_paid, dec("4000"));
    assert_eq!(refund.refund_amount, dec("8000"));
    assert_eq!(refund.deduction_amount, dec("2000"));
    assert_eq!(refund.platform_refund, dec("4800"));
    assert_eq!(refund.personal_refund, dec("3200"));
    assert!(refund.platform_refund <= refund.platform_paid);

    let approved = ctx
        .controller
        .approve(&ctx.admin, refund.id, None, None)
        .await
        .unwrap();
    let intent_id = approved.refund_intent_id.clone().unwrap();

    let partial = ctx
        .controller
        .confirm_intent(&ctx.admin, &intent_id)
        .await
        .unwrap();
    assert_eq!(partial.status, RefundStatus::PartialCompleted);
    assert!(partial.personal_completed_at.is_none());

    // Booking stays confirmed until the host-paid part is settled.
    let stored_booking = ctx.bookings.find_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(stored_booking.status, BookingStatus::Confirmed);

    let err = ctx
        .controller
        .complete_personal(&ctx.admin, refund.id, "cash")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::ValidationError);

    let completed = ctx
        .controller
        .complete_personal(&ctx.admin, refund.id, "Host returned 3,200 by bank transfer")
        .await
        .unwrap();
    assert_eq!(completed.status, RefundStatus::Completed);
    assert!(completed.personal_completed_at.is_some());
    assert!(completed
        .admin_notes
        .as_deref()
        .unwrap()
        .contains("bank transfer"));

    let stored_booking = ctx.bookings.find_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(stored_booking.status, BookingStatus::Refunded);
}

#[tokio::test]
async fn rejected_request_is_terminal() {
    let ctx = TestContext::new();
    let booking = ctx.booking(96, "10000", "0").await;
    let refund = ctx
        .controller
        .request_refund(&ctx.client, booking.id, REASON)
        .await
        .unwrap();

    let rejected = ctx
        .controller
        .reject(&ctx.admin, refund.id, "not eligible")
        .await
        .unwrap();
    assert_eq!(rejected.status, RefundStatus::Rejected);
    assert_eq!(rejected.admin_notes.as_deref(), Some("not eligible"));

    let err = ctx
        .controller
        .approve(&ctx.admin, refund.id, None, None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::InvalidState);
    assert_eq!(ctx.sandbox.intent_count(), 0);

    // A rejected request no longer blocks a new one.
    let again = ctx
        .controller
        .request_refund(&ctx.client, booking.id, REASON)
        .await
        .unwrap();
    assert_eq!(again.status, RefundStatus::Pending);
}

#[tokio::test]
async fn reject_requires_notes() {
    let ctx = TestContext::new();
    let booking = ctx.booking(96, "10000", "0").await;
    let refund = ctx
        .controller
        .request_refund(&ctx.client, booking.id, REASON)
        .await
        .unwrap();

    let err = ctx
        .controller
        .reject(&ctx.admin, refund.id, "   ")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn amounts_always_add_up() {
    let ctx = TestContext::new();
    let cases = [
        (200, "10000", "0"),
        (100, "7333.33", "2666.67"),
        (30, "1234.56", "765.44"),
        (50, "500", "500"),
        (80, "0", "9999.99"),
    ];

    for (hours, platform, personal) in cases {
        let booking = ctx.booking(hours, platform, personal).await;
        let refund = ctx
            .controller
            .request_refund(&ctx.client, booking.id, REASON)
            .await
            .unwrap();

        assert_eq!(
            &refund.refund_amount + &refund.deduction_amount,
            refund.amount_paid,
            "refund + deduction for {hours}h"
        );
        assert_eq!(
            &refund.platform_refund + &refund.personal_refund,
            refund.refund_amount,
            "platform + personal for {hours}h"
        );
        assert!(refund.platform_refund <= refund.platform_paid);
        assert!(refund.personal_refund <= refund.personal_paid);
        assert!(refund.refund_amount >= BigDecimal::zero());
    }
}

#[tokio::test]
async fn personal_only_refund_skips_the_processor() {
    let ctx = TestContext::new();
    let booking = ctx.booking(200, "0", "5000").await;
    let refund = ctx
        .controller
        .request_refund(&ctx.client, booking.id, REASON)
        .await
        .unwrap();

    let approved = ctx
        .controller
        .approve(&ctx.admin, refund.id, None, None)
        .await
        .unwrap();
    assert_eq!(approved.status, RefundStatus::ManualReview);
    assert!(approved.refund_intent_id.is_none());
    assert_eq!(ctx.sandbox.intent_count(), 0);

    let completed = ctx
        .controller
        .complete_personal(&ctx.admin, refund.id, "Host refunded the guest directly")
        .await
        .unwrap();
    assert_eq!(completed.status, RefundStatus::Completed);
}

#[tokio::test]
async fn declined_confirmation_fails_the_request() {
    let ctx = TestContext::new();
    let booking = ctx.booking(96, "10000", "0").await;
    let refund = ctx
        .controller
        .request_refund(&ctx.client, booking.id, REASON)
        .await
        .unwrap();
    let approved = ctx
        .controller
        .approve(&ctx.admin, refund.id, None, None)
        .await
        .unwrap();

    ctx.sandbox.set_behaviour(SandboxBehaviour::DeclineConfirmation);
    let failed = ctx
        .controller
        .confirm_intent(&ctx.admin, approved.refund_intent_id.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(failed.status, RefundStatus::Failed);
    assert_eq!(
        failed.failure_reason.as_deref(),
        Some("sandbox declined the refund")
    );

    let booking_after = ctx.bookings.find_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(booking_after.status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn processor_error_on_confirm_is_recorded_and_returned() {
    let ctx = TestContext::new();
    let booking = ctx.booking(96, "10000", "0").await;
    let refund = ctx
        .controller
        .request_refund(&ctx.client, booking.id, REASON)
        .await
        .unwrap();
    let approved = ctx
        .controller
        .approve(&ctx.admin, refund.id, None, None)
        .await
        .unwrap();

    ctx.sandbox.set_behaviour(SandboxBehaviour::FailConfirmation);
    let err = ctx
        .controller
        .confirm_intent(&ctx.admin, approved.refund_intent_id.as_deref().unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::ProcessorError);

    let stored = ctx.refunds.find_by_id(refund.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RefundStatus::Failed);
    assert!(stored.failure_reason.is_some());
}

#[tokio::test]
async fn concurrent_approvals_let_exactly_one_win() {
    let ctx = TestContext::with_behaviour(SandboxBehaviour::Stall(Duration::from_millis(20)));
    let booking = ctx.booking(96, "10000", "0").await;
    let refund = ctx
        .controller
        .request_refund(&ctx.client, booking.id, REASON)
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        ctx.controller.approve(&ctx.admin, refund.id, None, None),
        ctx.controller.approve(&ctx.admin, refund.id, None, None),
    );

    let (wins, losses): (Vec<_>, Vec<_>) = [first, second].into_iter().partition(|r| r.is_ok());
    assert_eq!(wins.len(), 1);
    assert_eq!(losses.len(), 1);
    let err = losses.into_iter().next().unwrap().unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::ConcurrentModification);
    assert_eq!(err.status_code(), 409);

    // Both calls shared one idempotency key, so only one intent exists.
    assert_eq!(ctx.sandbox.intent_count(), 1);
    let stored = ctx.refunds.find_by_id(refund.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RefundStatus::Approved);
    assert_eq!(stored.version, 1);
}

#[tokio::test]
async fn stale_version_cannot_overwrite() {
    let ctx = TestContext::new();
    let booking = ctx.booking(96, "10000", "0").await;
    let refund = ctx
        .controller
        .request_refund(&ctx.client, booking.id, REASON)
        .await
        .unwrap();

    ctx.controller
        .reject(&ctx.admin, refund.id, "duplicate booking")
        .await
        .unwrap();

    let mut stale = refund.clone();
    stale.status = RefundStatus::Approved;
    let err = ctx.refunds.update(&stale, refund.version).await.unwrap_err();
    assert!(err.is_version_conflict());

    let stored = ctx.refunds.find_by_id(refund.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RefundStatus::Rejected);
}

#[tokio::test]
async fn clients_only_see_their_own_requests() {
    let ctx = TestContext::new();
    let first = ctx.booking(96, "10000", "0").await;
    let second = ctx.booking(200, "3000", "0").await;
    for booking in [&first, &second] {
        ctx.controller
            .request_refund(&ctx.client, booking.id, REASON)
            .await
            .unwrap();
    }

    let mine = ctx.controller.list_mine(&ctx.client, None).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine[0].created_at >= mine[1].created_at);

    let stranger = Actor::client(Uuid::new_v4());
    assert!(ctx.controller.list_mine(&stranger, None).await.unwrap().is_empty());
    let err = ctx.controller.get(&stranger, mine[0].id).await.unwrap_err();
    assert_eq!(err.status_code(), 403);
}

#[tokio::test]
async fn zero_refund_is_never_settled() {
    let ctx = TestContext::new();
    // Inside the final window the policy refunds nothing.
    let late = ctx.booking(5, "10000", "0").await;
    let err = ctx
        .controller
        .request_refund(&ctx.client, late.id, REASON)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::BookingNotRefundable);

    let booking = ctx.booking(96, "10000", "0").await;
    let refund = ctx
        .controller
        .request_refund(&ctx.client, booking.id, REASON)
        .await
        .unwrap();
    let err = ctx
        .controller
        .approve(&ctx.admin, refund.id, None, Some(&dec("0")))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::ValidationError);

    for stored in [late, booking] {
        let stored = ctx.bookings.find_booking(stored.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Confirmed);
    }
    let pending = ctx.refunds.find_by_id(refund.id).await.unwrap().unwrap();
    assert_eq!(pending.status, RefundStatus::Pending);
}

#[tokio::test]
async fn custom_amount_just_outside_bounds_is_refused() {
    let ctx = TestContext::new();
    let booking = ctx.booking(96, "10000", "0").await;
    let refund = ctx
        .controller
        .request_refund(&ctx.client, booking.id, REASON)
        .await
        .unwrap();

    for amount in ["10000.004", "-0.004"] {
        let err = ctx
            .controller
            .approve(&ctx.admin, refund.id, None, Some(&dec(amount)))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::ValidationError, "{amount}");
    }

    let stored = ctx.refunds.find_by_id(refund.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RefundStatus::Pending);
    assert_eq!(stored.version, refund.version);
    assert_eq!(ctx.sandbox.intent_count(), 0);
}
