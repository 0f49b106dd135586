//! Refund domain: entities, lifecycle state machine, cancellation policy and
//! amount computation. Nothing here performs I/O.

pub mod breakdown;
pub mod policy;
pub mod state;
pub mod types;

pub use breakdown::{round_money, AmountSplit, BreakdownError, RefundBreakdown};
pub use policy::{PolicyDecision, PolicyError, PolicyTable, PolicyTier};
pub use state::{InvalidTransition, RefundEvent};
pub use types::{
    Booking, BookingStatus, Pagination, RefundPage, RefundQuery, RefundRequest, RefundStatus,
};
