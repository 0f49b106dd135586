//! Shared fixtures for the integration tests: in-memory stores, the sandbox
//! processor and a fully wired router.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use bigdecimal::BigDecimal;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

use rental_refunds::api::{self, auth::USER_ID_HEADER, auth::USER_ROLE_HEADER, RefundApiState};
use rental_refunds::database::{MemoryBookingStore, MemoryRefundStore};
use rental_refunds::health::HealthChecker;
use rental_refunds::payments::providers::{SandboxBehaviour, SandboxProcessor};
use rental_refunds::refunds::{Booking, BookingStatus, PolicyTable};
use rental_refunds::security::Actor;
use rental_refunds::services::{
    ControllerSettings, NotificationService, RefundFacade, RefundLifecycleController,
};

pub const REASON: &str = "Family emergency, we cannot travel anymore";

pub fn dec(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap()
}

pub struct TestContext {
    pub controller: Arc<RefundLifecycleController>,
    pub refunds: Arc<MemoryRefundStore>,
    pub bookings: Arc<MemoryBookingStore>,
    pub sandbox: Arc<SandboxProcessor>,
    pub client: Actor,
    pub admin: Actor,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_behaviour(SandboxBehaviour::Succeed)
    }

    pub fn with_behaviour(behaviour: SandboxBehaviour) -> Self {
        let refunds = Arc::new(MemoryRefundStore::new());
        let bookings = Arc::new(MemoryBookingStore::new());
        let sandbox = Arc::new(SandboxProcessor::new(behaviour));
        let controller = Arc::new(RefundLifecycleController::new(
            refunds.clone(),
            bookings.clone(),
            sandbox.clone(),
            Arc::new(NotificationService::new()),
            PolicyTable::default(),
            ControllerSettings {
                processor_timeout: Duration::from_millis(250),
                ..Default::default()
            },
        ));

        Self {
            controller,
            refunds,
            bookings,
            sandbox,
            client: Actor::client(Uuid::new_v4()),
            admin: Actor::admin(Uuid::new_v4()),
        }
    }

    /// Seed a confirmed booking owned by `self.client`, checking in
    /// `hours_ahead` hours (plus a margin) from now.
    pub async fn booking(&self, hours_ahead: i64, platform: &str, personal: &str) -> Booking {
        let platform = dec(platform);
        let personal = dec(personal);
        let booking = Booking {
            id: Uuid::new_v4(),
            client_id: self.client.user_id,
            host_id: Uuid::new_v4(),
            check_in: Utc::now()
                + ChronoDuration::hours(hours_ahead)
                + ChronoDuration::minutes(30),
            amount_paid: &platform + &personal,
            platform_paid: platform,
            personal_paid: personal,
            status: BookingStatus::Confirmed,
        };
        self.bookings.insert_booking(booking.clone()).await;
        booking
    }

    pub fn router(&self) -> Router {
        let state = RefundApiState::new(self.controller.clone(), RefundFacade::new("₱"));
        api::app(state, HealthChecker::new(self.sandbox.clone()))
    }
}

pub fn request(method: &str, uri: &str, actor: Option<&Actor>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder
            .header(USER_ID_HEADER, actor.user_id.to_string())
            .header(USER_ROLE_HEADER, actor.role.as_str());
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Send one request through a clone of `app` and decode the JSON answer.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}
