//! Refund lifecycle state machine.
//!
//! Every status change in the crate goes through [`RefundStatus::apply`]. The
//! table below is the complete set of legal moves; any other pair is rejected
//! with [`InvalidTransition`].
//!
//! | from                                | event                              | to                  |
//! |-------------------------------------|------------------------------------|---------------------|
//! | `pending`                           | approve, platform refund > 0       | `approved`          |
//! | `pending`                           | approve, nothing platform-refunded | `manual_review`     |
//! | `pending`                           | reject                             | `rejected`          |
//! | `approved`                          | confirm intent                     | `processing`        |
//! | `processing`                        | processor success, no personal     | `completed`         |
//! | `processing`                        | processor success, personal > 0    | `partial_completed` |
//! | `processing`                        | processor failure                  | `failed`            |
//! | `partial_completed`/`manual_review` | complete personal                  | `completed`         |

use thiserror::Error;

use crate::refunds::types::RefundStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundEvent {
    Approve { has_platform_refund: bool },
    Reject,
    ConfirmIntent,
    ProcessorSucceeded { has_personal_portion: bool },
    ProcessorFailed,
    CompletePersonal,
}

impl RefundEvent {
    pub fn action(&self) -> &'static str {
        match self {
            RefundEvent::Approve { .. } => "approve",
            RefundEvent::Reject => "reject",
            RefundEvent::ConfirmIntent => "confirm_intent",
            RefundEvent::ProcessorSucceeded { .. } => "processor_succeeded",
            RefundEvent::ProcessorFailed => "processor_failed",
            RefundEvent::CompletePersonal => "complete_personal",
        }
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("cannot {action} a refund in status {from}")]
pub struct InvalidTransition {
    pub from: RefundStatus,
    pub action: &'static str,
}

impl RefundStatus {
    pub fn apply(self, event: RefundEvent) -> Result<RefundStatus, InvalidTransition> {
        use RefundEvent as E;
        use RefundStatus as S;

        let next = match (self, event) {
            (S::Pending, E::Approve { has_platform_refund: true }) => S::Approved,
            (S::Pending, E::Approve { has_platform_refund: false }) => S::ManualReview,
            (S::Pending, E::Reject) => S::Rejected,
            (S::Approved, E::ConfirmIntent) => S::Processing,
            (S::Processing, E::ProcessorSucceeded { has_personal_portion: false }) => S::Completed,
            (S::Processing, E::ProcessorSucceeded { has_personal_portion: true }) => {
                S::PartialCompleted
            }
            (S::Processing, E::ProcessorFailed) => S::Failed,
            (S::PartialCompleted | S::ManualReview, E::CompletePersonal) => S::Completed,
            (from, event) => {
                return Err(InvalidTransition {
                    from,
                    action: event.action(),
                })
            }
        };

        Ok(next)
    }

    pub fn can_apply(self, event: RefundEvent) -> bool {
        self.apply(event).is_ok()
    }
}
