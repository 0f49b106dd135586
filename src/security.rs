//! Caller identity and role checks.
//!
//! Identity is established upstream; this service only receives the user id
//! and role and decides what that caller may do.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

use crate::error::AuthorizationError;
use crate::refunds::{Booking, RefundRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Client,
    Host,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Client => "client",
            Role::Host => "host",
        }
    }
}

impl FromStr for Role {
    type Err = AuthorizationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "client" => Ok(Role::Client),
            "host" => Ok(Role::Host),
            other => Err(AuthorizationError::Unauthenticated {
                reason: format!("unknown role '{}'", other),
            }),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self::new(user_id, Role::Admin)
    }

    pub fn client(user_id: Uuid) -> Self {
        Self::new(user_id, Role::Client)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub fn ensure_admin(actor: &Actor) -> Result<(), AuthorizationError> {
    if actor.is_admin() {
        return Ok(());
    }
    warn!(user_id = %actor.user_id, role = %actor.role, "admin_check_failed");
    Err(AuthorizationError::Forbidden {
        reason: "administrator role required".to_string(),
    })
}

/// Only the booking's customer may request or preview its refund.
pub fn ensure_booking_owner(actor: &Actor, booking: &Booking) -> Result<(), AuthorizationError> {
    if booking.client_id == actor.user_id {
        return Ok(());
    }
    warn!(
        user_id = %actor.user_id,
        booking_id = %booking.id,
        "booking_owner_check_failed"
    );
    Err(AuthorizationError::Forbidden {
        reason: "booking belongs to another customer".to_string(),
    })
}

/// Admins see every request; customers and hosts see their own.
pub fn ensure_can_view(actor: &Actor, refund: &RefundRequest) -> Result<(), AuthorizationError> {
    let allowed = match actor.role {
        Role::Admin => true,
        Role::Client => refund.client_id == actor.user_id,
        Role::Host => refund.host_id == actor.user_id,
    };
    if allowed {
        return Ok(());
    }
    warn!(
        user_id = %actor.user_id,
        refund_id = %refund.id,
        "refund_view_check_failed"
    );
    Err(AuthorizationError::Forbidden {
        reason: "refund request belongs to another customer".to_string(),
    })
}
