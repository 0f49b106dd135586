//! Display-ready refund records for the admin and customer views.
//!
//! Everything here is a pure function of the request: no store access, no
//! business rules beyond reading `status`, `personal_paid` and the intent id.

use crate::refunds::{round_money, RefundRequest, RefundStatus};
use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BadgeTone {
    Warning,
    Info,
    Primary,
    Success,
    Danger,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPresentation {
    pub status: RefundStatus,
    pub label: &'static str,
    pub tone: BadgeTone,
}

/// Label and badge for every status, in `RefundStatus` declaration order.
pub const STATUS_PRESENTATION: [StatusPresentation; 8] = [
    StatusPresentation {
        status: RefundStatus::Pending,
        label: "Pending Review",
        tone: BadgeTone::Warning,
    },
    StatusPresentation {
        status: RefundStatus::Approved,
        label: "Approved",
        tone: BadgeTone::Info,
    },
    StatusPresentation {
        status: RefundStatus::Processing,
        label: "Processing",
        tone: BadgeTone::Primary,
    },
    StatusPresentation {
        status: RefundStatus::Completed,
        label: "Completed",
        tone: BadgeTone::Success,
    },
    StatusPresentation {
        status: RefundStatus::PartialCompleted,
        label: "Partially Completed",
        tone: BadgeTone::Info,
    },
    StatusPresentation {
        status: RefundStatus::ManualReview,
        label: "Manual Review",
        tone: BadgeTone::Secondary,
    },
    StatusPresentation {
        status: RefundStatus::Rejected,
        label: "Rejected",
        tone: BadgeTone::Danger,
    },
    StatusPresentation {
        status: RefundStatus::Failed,
        label: "Failed",
        tone: BadgeTone::Danger,
    },
];

pub fn presentation(status: RefundStatus) -> &'static StatusPresentation {
    &STATUS_PRESENTATION[status as usize]
}

/// Formats `amount` as `₱10,000.00`: two decimals, comma thousands separator.
pub fn format_currency(amount: &BigDecimal, symbol: &str) -> String {
    let rounded = round_money(amount).to_string();
    let (sign, digits) = match rounded.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rounded.as_str()),
    };
    let (integer, fraction) = digits.split_once('.').unwrap_or((digits, "00"));

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{}{}{}.{}", sign, symbol, grouped, fraction)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FormattedAmounts {
    pub amount_paid: String,
    pub platform_paid: String,
    pub personal_paid: String,
    pub refund_amount: String,
    pub deduction_amount: String,
    pub platform_refund: String,
    pub personal_refund: String,
}

/// A refund request plus everything a view needs to render it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundView {
    #[serde(flatten)]
    pub refund: RefundRequest,
    pub status_label: &'static str,
    pub status_tone: BadgeTone,
    pub formatted: FormattedAmounts,
    pub has_personal_portion: bool,
    pub can_process: bool,
    pub can_confirm: bool,
    pub can_complete_manual: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RefundStatistics {
    pub total: u64,
    /// Every status appears, zero when no request has it
    pub by_status: BTreeMap<String, u64>,
    pub total_refunded: BigDecimal,
    pub total_deductions: BigDecimal,
    pub total_refunded_formatted: String,
    pub total_deductions_formatted: String,
}

#[derive(Debug, Clone)]
pub struct RefundFacade {
    currency_symbol: String,
}

impl RefundFacade {
    pub fn new(currency_symbol: impl Into<String>) -> Self {
        Self {
            currency_symbol: currency_symbol.into(),
        }
    }

    pub fn format(&self, amount: &BigDecimal) -> String {
        format_currency(amount, &self.currency_symbol)
    }

    pub fn view(&self, refund: &RefundRequest) -> RefundView {
        let presentation = presentation(refund.status);
        RefundView {
            status_label: presentation.label,
            status_tone: presentation.tone,
            formatted: FormattedAmounts {
                amount_paid: self.format(&refund.amount_paid),
                platform_paid: self.format(&refund.platform_paid),
                personal_paid: self.format(&refund.personal_paid),
                refund_amount: self.format(&refund.refund_amount),
                deduction_amount: self.format(&refund.deduction_amount),
                platform_refund: self.format(&refund.platform_refund),
                personal_refund: self.format(&refund.personal_refund),
            },
            has_personal_portion: refund.has_personal_portion(),
            can_process: refund.status == RefundStatus::Pending,
            can_confirm: refund.status == RefundStatus::Approved
                && refund.refund_intent_id.is_some(),
            can_complete_manual: matches!(
                refund.status,
                RefundStatus::PartialCompleted | RefundStatus::ManualReview
            ),
            refund: refund.clone(),
        }
    }

    pub fn views(&self, refunds: &[RefundRequest]) -> Vec<RefundView> {
        refunds.iter().map(|r| self.view(r)).collect()
    }

    /// Counts per status and money totals.
    ///
    /// A partially completed request counts its platform refund as refunded;
    /// the personal share is only counted once the request completes.
    pub fn statistics(&self, refunds: &[RefundRequest]) -> RefundStatistics {
        let mut by_status: BTreeMap<String, u64> = RefundStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        let mut total_refunded = BigDecimal::zero();
        let mut total_deductions = BigDecimal::zero();

        for refund in refunds {
            *by_status.entry(refund.status.as_str().to_string()).or_insert(0) += 1;
            match refund.status {
                RefundStatus::Completed => {
                    total_refunded += &refund.refund_amount;
                    total_deductions += &refund.deduction_amount;
                }
                RefundStatus::PartialCompleted => {
                    total_refunded += &refund.platform_refund;
                    total_deductions += &refund.deduction_amount;
                }
                _ => {}
            }
        }

        let total_refunded = round_money(&total_refunded);
        let total_deductions = round_money(&total_deductions);
        RefundStatistics {
            total: refunds.len() as u64,
            by_status,
            total_refunded_formatted: self.format(&total_refunded),
            total_deductions_formatted: self.format(&total_deductions),
            total_refunded,
            total_deductions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refunds::{Booking, BookingStatus, RefundBreakdown};
    use chrono::Utc;
    use std::str::FromStr;
    use uuid::Uuid;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn refund(platform: &str, personal: &str, status: RefundStatus) -> RefundRequest {
        let platform = dec(platform);
        let personal = dec(personal);
        let booking = Booking {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            host_id: Uuid::new_v4(),
            check_in: Utc::now(),
            amount_paid: &platform + &personal,
            platform_paid: platform,
            personal_paid: personal,
            status: BookingStatus::Confirmed,
        };
        let breakdown =
            RefundBreakdown::from_percentage(&booking.amount_split(), &dec("80"), "80% refund");
        let mut request = RefundRequest::new(&booking, "change of plans", 100, breakdown);
        request.status = status;
        request
    }

    #[test]
    fn table_follows_status_order() {
        for status in RefundStatus::ALL {
            assert_eq!(presentation(status).status, status);
        }
        assert_eq!(presentation(RefundStatus::Failed).tone, BadgeTone::Danger);
    }

    #[test]
    fn currency_formatting() {
        assert_eq!(format_currency(&dec("10000"), "₱"), "₱10,000.00");
        assert_eq!(format_currency(&dec("1234567.891"), "₱"), "₱1,234,567.89");
        assert_eq!(format_currency(&dec("999.5"), "₱"), "₱999.50");
        assert_eq!(format_currency(&dec("0"), "₱"), "₱0.00");
        assert_eq!(format_currency(&dec("-1500"), "$"), "-$1,500.00");
    }

    #[test]
    fn flags_follow_status() {
        let facade = RefundFacade::new("₱");

        let pending = facade.view(&refund("10000", "0", RefundStatus::Pending));
        assert!(pending.can_process && !pending.can_confirm && !pending.can_complete_manual);

        let mut approved = refund("10000", "0", RefundStatus::Approved);
        assert!(!facade.view(&approved).can_confirm);
        approved.refund_intent_id = Some("ri_1".to_string());
        assert!(facade.view(&approved).can_confirm);

        for status in [RefundStatus::PartialCompleted, RefundStatus::ManualReview] {
            let view = facade.view(&refund("6000", "4000", status));
            assert!(view.can_complete_manual);
            assert!(view.has_personal_portion);
        }
        assert!(!facade.view(&refund("10000", "0", RefundStatus::Completed)).can_complete_manual);
    }

    #[test]
    fn view_formats_amounts() {
        let facade = RefundFacade::new("₱");
        let view = facade.view(&refund("6000", "4000", RefundStatus::Pending));
        assert_eq!(view.formatted.refund_amount, "₱8,000.00");
        assert_eq!(view.formatted.platform_refund, "₱4,800.00");
        assert_eq!(view.status_label, "Pending Review");

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["canProcess"], true);
        assert_eq!(json["statusTone"], "warning");
    }

    #[test]
    fn statistics_totals() {
        let facade = RefundFacade::new("₱");
        let stats = facade.statistics(&[
            refund("10000", "0", RefundStatus::Completed),
            refund("6000", "4000", RefundStatus::PartialCompleted),
            refund("10000", "0", RefundStatus::Pending),
            refund("10000", "0", RefundStatus::Rejected),
        ]);

        assert_eq!(stats.total, 4);
        assert_eq!(stats.by_status["completed"], 1);
        assert_eq!(stats.by_status["failed"], 0);
        assert_eq!(stats.by_status.len(), 8);
        // 8000 completed + 4800 platform share of the partial one
        assert_eq!(stats.total_refunded, dec("12800"));
        assert_eq!(stats.total_deductions, dec("4000"));
        assert_eq!(stats.total_refunded_formatted, "₱12,800.00");
    }
}
