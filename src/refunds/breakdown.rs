//! Refund amount computation.
//!
//! All amounts are rounded half-up to two decimal places. Deduction and the
//! personal share are derived by subtraction so both sums stay exact:
//! `refund + deduction == amount_paid` and `platform + personal == refund`.

use bigdecimal::{BigDecimal, RoundingMode, Zero};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CUSTOM_AMOUNT_DESCRIPTION: &str = "Custom amount set by administrator";

pub fn round_money(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(2, RoundingMode::HalfUp)
}

#[derive(Debug, Error, PartialEq)]
pub enum BreakdownError {
    #[error("refund amount {amount} must be between 0 and {max}")]
    AmountOutOfRange { amount: BigDecimal, max: BigDecimal },
    #[error("refund amount {amount} has more than two decimal places")]
    TooPrecise { amount: BigDecimal },
}

/// What the customer paid and through which channel.
#[derive(Debug, Clone, PartialEq)]
pub struct AmountSplit {
    pub amount_paid: BigDecimal,
    pub platform_paid: BigDecimal,
    pub personal_paid: BigDecimal,
}

impl AmountSplit {
    pub fn is_consistent(&self) -> bool {
        &self.platform_paid + &self.personal_paid == self.amount_paid
            && self.platform_paid >= BigDecimal::zero()
            && self.personal_paid >= BigDecimal::zero()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundBreakdown {
    pub refund_percentage: BigDecimal,
    pub policy_description: String,
    pub refund_amount: BigDecimal,
    pub deduction_amount: BigDecimal,
    pub platform_refund: BigDecimal,
    pub personal_refund: BigDecimal,
}

impl RefundBreakdown {
    pub fn from_percentage(
        split: &AmountSplit,
        percentage: &BigDecimal,
        description: impl Into<String>,
    ) -> Self {
        let refund_amount = round_money(&(&split.amount_paid * percentage / BigDecimal::from(100)));
        Self::build(split, round_money(percentage), refund_amount, description.into())
    }

    /// Breakdown for an administrator-chosen amount in `0..=amount_paid`,
    /// given in whole cents.
    pub fn from_custom_amount(
        split: &AmountSplit,
        amount: &BigDecimal,
    ) -> Result<Self, BreakdownError> {
        if *amount < BigDecimal::zero() || *amount > split.amount_paid {
            return Err(BreakdownError::AmountOutOfRange {
                amount: amount.clone(),
                max: round_money(&split.amount_paid),
            });
        }
        let refund_amount = round_money(amount);
        if refund_amount != *amount {
            return Err(BreakdownError::TooPrecise {
                amount: amount.clone(),
            });
        }

        let percentage = if split.amount_paid.is_zero() {
            BigDecimal::zero()
        } else {
            round_money(&(&refund_amount * BigDecimal::from(100) / &split.amount_paid))
        };

        Ok(Self::build(
            split,
            percentage,
            refund_amount,
            CUSTOM_AMOUNT_DESCRIPTION.to_string(),
        ))
    }

    fn build(
        split: &AmountSplit,
        refund_percentage: BigDecimal,
        refund_amount: BigDecimal,
        policy_description: String,
    ) -> Self {
        let amount_paid = round_money(&split.amount_paid);
        let deduction_amount = &amount_paid - &refund_amount;
        let platform_refund = if amount_paid.is_zero() {
            BigDecimal::zero().with_scale(2)
        } else {
            round_money(&(&refund_amount * &split.platform_paid / &amount_paid))
        };
        let personal_refund = &refund_amount - &platform_refund;

        Self {
            refund_percentage,
            policy_description,
            refund_amount,
            deduction_amount,
            platform_refund,
            personal_refund,
        }
    }

    pub fn has_platform_refund(&self) -> bool {
        self.platform_refund > BigDecimal::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    fn split(paid: &str, platform: &str, personal: &str) -> AmountSplit {
        AmountSplit {
            amount_paid: dec(paid),
            platform_paid: dec(platform),
            personal_paid: dec(personal),
        }
    }

    #[test]
    fn full_platform_payment_at_eighty_percent() {
        let b = RefundBreakdown::from_percentage(&split("10000", "10000", "0"), &dec("80"), "80%");
        assert_eq!(b.refund_amount, dec("8000"));
        assert_eq!(b.deduction_amount, dec("2000"));
        assert_eq!(b.platform_refund, dec("8000"));
        assert_eq!(b.personal_refund, dec("0"));
    }

    #[test]
    fn mixed_payment_is_split_proportionally() {
        let b = RefundBreakdown::from_percentage(&split("10000", "6000", "4000"), &dec("80"), "80%");
        assert_eq!(b.refund_amount, dec("8000"));
        assert_eq!(b.platform_refund, dec("4800"));
        assert_eq!(b.personal_refund, dec("3200"));

        let b = RefundBreakdown::from_percentage(&split("10000", "8000", "2000"), &dec("80"), "80%");
        assert_eq!(b.platform_refund, dec("6400"));
        assert_eq!(b.personal_refund, dec("1600"));
    }

    #[test]
    fn sums_stay_exact_with_awkward_amounts() {
        let s = split("999.99", "333.33", "666.66");
        for pct in ["0", "33", "50", "66.67", "80", "99.99", "100"] {
            let b = RefundBreakdown::from_percentage(&s, &dec(pct), "tier");
            assert_eq!(&b.refund_amount + &b.deduction_amount, s.amount_paid, "pct {}", pct);
            assert_eq!(&b.platform_refund + &b.personal_refund, b.refund_amount, "pct {}", pct);
            assert!(b.platform_refund <= s.platform_paid);
        }
    }

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(round_money(&dec("0.125")), dec("0.13"));
        assert_eq!(round_money(&dec("0.124")), dec("0.12"));
        assert_eq!(round_money(&dec("2.5")), dec("2.50"));
    }

    #[test]
    fn custom_amount_derives_percentage() {
        let b = RefundBreakdown::from_custom_amount(&split("10000", "10000", "0"), &dec("2500")).unwrap();
        assert_eq!(b.refund_percentage, dec("25"));
        assert_eq!(b.deduction_amount, dec("7500"));
        assert_eq!(b.policy_description, CUSTOM_AMOUNT_DESCRIPTION);
    }

    #[test]
    fn custom_amount_bounds() {
        let s = split("10000", "10000", "0");
        assert!(RefundBreakdown::from_custom_amount(&s, &dec("0")).is_ok());
        assert!(RefundBreakdown::from_custom_amount(&s, &dec("10000")).is_ok());
        assert!(matches!(
            RefundBreakdown::from_custom_amount(&s, &dec("10000.01")),
            Err(BreakdownError::AmountOutOfRange { .. })
        ));
        assert!(RefundBreakdown::from_custom_amount(&s, &dec("-1")).is_err());
    }

    #[test]
    fn custom_amount_is_checked_before_rounding() {
        let s = split("10000", "10000", "0");
        for amount in ["10000.004", "-0.004"] {
            assert!(
                matches!(
                    RefundBreakdown::from_custom_amount(&s, &dec(amount)),
                    Err(BreakdownError::AmountOutOfRange { .. })
                ),
                "{amount}"
            );
        }
        assert_eq!(
            RefundBreakdown::from_custom_amount(&s, &dec("2500.005")),
            Err(BreakdownError::TooPrecise { amount: dec("2500.005") })
        );
        let b = RefundBreakdown::from_custom_amount(&s, &dec("2500.500")).unwrap();
        assert_eq!(b.refund_amount, dec("2500.50"));
    }

    #[test]
    fn personal_only_payment_has_no_platform_refund() {
        let b = RefundBreakdown::from_percentage(&split("5000", "0", "5000"), &dec("100"), "full");
        assert!(!b.has_platform_refund());
        assert_eq!(b.personal_refund, dec("5000"));
    }
}
