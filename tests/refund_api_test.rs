//! Integration tests for the refund HTTP API
//!
//! Tests cover:
//! - Caller identification headers
//! - Client endpoints (create, list, preview, detail)
//! - Admin processing endpoints
//! - Error body shape and request id propagation
//! - Admin listing with pagination and statistics

mod support;

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

use support::{request, send, TestContext, REASON};

#[tokio::test]
async fn missing_identity_is_unauthorized() {
    let ctx = TestContext::new();
    let app = ctx.router();

    let (status, body) = send(&app, request("GET", "/refunds/mine", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "UNAUTHORIZED");
}

#[tokio::test]
async fn client_creates_and_reads_a_refund() {
    let ctx = TestContext::new();
    let app = ctx.router();
    let booking = ctx.booking(96, "6000", "4000").await;

    let (status, created) = send(
        &app,
        request(
            "POST",
            "/refunds",
            Some(&ctx.client),
            Some(json!({ "bookingId": booking.id, "reason": REASON })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "pending");
    assert_eq!(created["statusLabel"], "Pending Review");
    assert_eq!(created["statusTone"], "warning");
    assert_eq!(created["formatted"]["refundAmount"], "₱8,000.00");
    assert_eq!(created["formatted"]["platformRefund"], "₱4,800.00");
    assert_eq!(created["formatted"]["personalRefund"], "₱3,200.00");
    assert_eq!(created["hasPersonalPortion"], true);
    assert_eq!(created["canProcess"], true);
    assert_eq!(created["canConfirm"], false);

    let id = created["id"].as_str().unwrap().to_string();
    let (status, detail) = send(
        &app,
        request("GET", &format!("/refunds/{id}"), Some(&ctx.client), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["bookingId"], booking.id.to_string());

    let (status, mine) = send(
        &app,
        request("GET", "/refunds/mine?status=pending", Some(&ctx.client), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["refunds"].as_array().unwrap().len(), 1);

    let (status, mine) = send(
        &app,
        request("GET", "/refunds/mine?status=completed", Some(&ctx.client), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(mine["refunds"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_request_conflicts() {
    let ctx = TestContext::new();
    let app = ctx.router();
    let booking = ctx.booking(96, "10000", "0").await;
    let body = json!({ "bookingId": booking.id, "reason": REASON });

    let (status, _) = send(
        &app,
        request("POST", "/refunds", Some(&ctx.client), Some(body.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, error) = send(
        &app,
        request("POST", "/refunds", Some(&ctx.client), Some(body)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error"], "DUPLICATE_REQUEST");
}

#[tokio::test]
async fn validation_errors_carry_field_details_and_request_id() {
    let ctx = TestContext::new();
    let app = ctx.router();
    let booking = ctx.booking(96, "10000", "0").await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/refunds",
            Some(&ctx.client),
            Some(json!({ "bookingId": booking.id, "reason": "short" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let header_id = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap();

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "VALIDATION_ERROR");
    assert_eq!(body["request_id"], header_id.as_str());
    assert_eq!(body["details"]["field"], "reason");

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/refunds",
            Some(&ctx.client),
            Some(json!({ "reason": REASON })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn preview_does_not_persist() {
    let ctx = TestContext::new();
    let app = ctx.router();
    let booking = ctx.booking(30, "6000", "0").await;

    let (status, preview) = send(
        &app,
        request(
            "GET",
            &format!("/refunds/preview?bookingId={}", booking.id),
            Some(&ctx.client),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["formattedRefundAmount"], "₱3,000.00");
    assert_eq!(preview["formattedDeductionAmount"], "₱3,000.00");
    assert!(ctx.refunds.is_empty().await);
}

#[tokio::test]
async fn admin_endpoints_reject_clients() {
    let ctx = TestContext::new();
    let app = ctx.router();

    let (status, body) = send(&app, request("GET", "/admin/refunds", Some(&ctx.client), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "FORBIDDEN");
}

#[tokio::test]
async fn admin_processes_a_split_refund_to_completion() {
    let ctx = TestContext::new();
    let app = ctx.router();
    let booking = ctx.booking(96, "6000", "4000").await;
    let refund = ctx
        .controller
        .request_refund(&ctx.client, booking.id, REASON)
        .await
        .unwrap();

    let (status, approved) = send(
        &app,
        request(
            "POST",
            &format!("/admin/refunds/{}/process", refund.id),
            Some(&ctx.admin),
            Some(json!({ "action": "approve", "notes": "Within policy" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "approved");
    assert_eq!(approved["canConfirm"], true);
    let intent_id = approved["refundIntentId"].as_str().unwrap().to_string();

    let (status, partial) = send(
        &app,
        request(
            "POST",
            "/admin/refunds/confirm-intent",
            Some(&ctx.admin),
            Some(json!({ "refundIntentId": intent_id })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(partial["status"], "partial_completed");
    assert_eq!(partial["statusLabel"], "Partially Completed");
    assert_eq!(partial["canCompleteManual"], true);

    let (status, completed) = send(
        &app,
        request(
            "POST",
            &format!("/admin/refunds/{}/complete-personal", refund.id),
            Some(&ctx.admin),
            Some(json!({ "notes": "Host returned the balance by bank transfer" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], "completed");
    assert_eq!(completed["statusTone"], "success");
}

#[tokio::test]
async fn reject_then_approve_is_an_invalid_state() {
    let ctx = TestContext::new();
    let app = ctx.router();
    let booking = ctx.booking(96, "10000", "0").await;
    let refund = ctx
        .controller
        .request_refund(&ctx.client, booking.id, REASON)
        .await
        .unwrap();
    let uri = format!("/admin/refunds/{}/process", refund.id);

    let (status, rejected) = send(
        &app,
        request(
            "POST",
            &uri,
            Some(&ctx.admin),
            Some(json!({ "action": "reject", "notes": "not eligible" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["status"], "rejected");

    let (status, error) = send(
        &app,
        request("POST", &uri, Some(&ctx.admin), Some(json!({ "action": "approve" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error"], "INVALID_STATE");
}

#[tokio::test]
async fn custom_amount_only_on_approve() {
    let ctx = TestContext::new();
    let app = ctx.router();
    let booking = ctx.booking(96, "10000", "0").await;
    let refund = ctx
        .controller
        .request_refund(&ctx.client, booking.id, REASON)
        .await
        .unwrap();
    let uri = format!("/admin/refunds/{}/process", refund.id);

    let (status, _) = send(
        &app,
        request(
            "POST",
            &uri,
            Some(&ctx.admin),
            Some(json!({ "action": "reject", "notes": "nope", "customAmount": "100" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, approved) = send(
        &app,
        request(
            "POST",
            &uri,
            Some(&ctx.admin),
            Some(json!({ "action": "approve", "customAmount": "9000" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["formatted"]["refundAmount"], "₱9,000.00");
    assert_eq!(approved["policyDescription"], "Custom amount set by administrator");
}

#[tokio::test]
async fn admin_list_paginates_and_reports_statistics() {
    let ctx = TestContext::new();
    let app = ctx.router();

    for _ in 0..3 {
        let booking = ctx.booking(96, "10000", "0").await;
        ctx.controller
            .request_refund(&ctx.client, booking.id, REASON)
            .await
            .unwrap();
    }

    let (status, page) = send(
        &app,
        request("GET", "/admin/refunds?page=2&limit=2", Some(&ctx.admin), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["refunds"].as_array().unwrap().len(), 1);
    assert_eq!(page["pagination"]["page"], 2);
    assert_eq!(page["pagination"]["limit"], 2);
    assert_eq!(page["pagination"]["total"], 3);
    assert_eq!(page["pagination"]["totalPages"], 2);

    assert_eq!(page["statistics"]["total"], 3);
    assert_eq!(page["statistics"]["byStatus"]["pending"], 3);
    assert_eq!(page["statistics"]["byStatus"]["completed"], 0);
    assert_eq!(page["statistics"]["totalRefundedFormatted"], "₱0.00");

    let (status, error) = send(
        &app,
        request("GET", "/admin/refunds?status=bogus", Some(&ctx.admin), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn health_probes_report_degraded_in_memory_setup() {
    let ctx = TestContext::new();
    let app = ctx.router();

    let (status, _) = send(&app, request("GET", "/health/live", None, None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, health) = send(&app, request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["checks"]["processor"]["status"], "warning");
}
