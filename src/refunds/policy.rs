//! Cancellation policy table.
//!
//! Maps the number of hours left before check-in to a refund percentage.
//! Tiers are kept sorted by `min_hours` descending; the first tier whose
//! threshold is met wins.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("policy tier '{0}' must look like <min_hours>:<percentage>")]
    MalformedTier(String),

    #[error("refund percentage {percentage} for {min_hours}h is outside 0..=100")]
    PercentageOutOfRange { min_hours: i64, percentage: u32 },

    #[error("duplicate policy tier for {0}h")]
    DuplicateThreshold(i64),

    #[error("policy table has no tiers")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTier {
    pub min_hours: i64,
    pub percentage: u8,
    pub description: String,
}

impl PolicyTier {
    pub fn new(min_hours: i64, percentage: u8) -> Self {
        Self {
            min_hours,
            percentage,
            description: describe(min_hours, percentage),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

fn describe(min_hours: i64, percentage: u8) -> String {
    let window = if min_hours <= 0 {
        "less than 24 hours before check-in".to_string()
    } else if min_hours % 24 == 0 {
        let days = min_hours / 24;
        if days == 1 {
            "at least 1 day before check-in".to_string()
        } else {
            format!("at least {} days before check-in", days)
        }
    } else {
        format!("at least {} hours before check-in", min_hours)
    };

    match percentage {
        100 => format!("Full refund: cancelled {}", window),
        0 => format!("No refund: cancelled {}", window),
        pct => format!("{}% refund: cancelled {}", pct, window),
    }
}

/// The outcome of a policy lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDecision {
    pub percentage: u8,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTable {
    tiers: Vec<PolicyTier>,
}

impl PolicyTable {
    pub fn new(mut tiers: Vec<PolicyTier>) -> Result<Self, PolicyError> {
        if tiers.is_empty() {
            return Err(PolicyError::Empty);
        }
        tiers.sort_by(|a, b| b.min_hours.cmp(&a.min_hours));
        for pair in tiers.windows(2) {
            if pair[0].min_hours == pair[1].min_hours {
                return Err(PolicyError::DuplicateThreshold(pair[0].min_hours));
            }
        }
        if let Some(tier) = tiers.iter().find(|t| t.percentage > 100) {
            return Err(PolicyError::PercentageOutOfRange {
                min_hours: tier.min_hours,
                percentage: u32::from(tier.percentage),
            });
        }
        Ok(Self { tiers })
    }

    /// Parse `"168:100,72:80,24:50,0:0"`.
    pub fn parse(raw: &str) -> Result<Self, PolicyError> {
        let mut tiers = Vec::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (hours, pct) = entry
                .split_once(':')
                .ok_or_else(|| PolicyError::MalformedTier(entry.to_string()))?;
            let min_hours: i64 = hours
                .trim()
                .parse()
                .map_err(|_| PolicyError::MalformedTier(entry.to_string()))?;
            let percentage: u32 = pct
                .trim()
                .parse()
                .map_err(|_| PolicyError::MalformedTier(entry.to_string()))?;
            let percentage = u8::try_from(percentage)
                .ok()
                .filter(|p| *p <= 100)
                .ok_or(PolicyError::PercentageOutOfRange {
                    min_hours,
                    percentage,
                })?;
            tiers.push(PolicyTier::new(min_hours, percentage));
        }
        Self::new(tiers)
    }

    pub fn tiers(&self) -> &[PolicyTier] {
        &self.tiers
    }

    pub fn lookup(&self, hours_before_checkin: i64) -> PolicyDecision {
        self.tiers
            .iter()
            .find(|tier| hours_before_checkin >= tier.min_hours)
            .map(|tier| PolicyDecision {
                percentage: tier.percentage,
                description: tier.description.clone(),
            })
            .unwrap_or_else(|| PolicyDecision {
                percentage: 0,
                description: "No refund".to_string(),
            })
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self {
            tiers: vec![
                PolicyTier::new(168, 100),
                PolicyTier::new(72, 80),
                PolicyTier::new(24, 50),
                PolicyTier::new(0, 0),
            ],
        }
    }
}
