//! Plan catalog entries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{DomainError, Money, PlanId, Timestamp, ValidationError};

/// Recurrence of a plan's charges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingInterval {
    Week,
    Month,
    Year,
}

impl BillingInterval {
    /// Stripe `recurring[interval]` value.
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Week => "week",
            BillingInterval::Month => "month",
            BillingInterval::Year => "year",
        }
    }

    /// Asaas subscription `cycle` value.
    pub fn asaas_cycle(&self) -> &'static str {
        match self {
            BillingInterval::Week => "WEEKLY",
            BillingInterval::Month => "MONTHLY",
            BillingInterval::Year => "YEARLY",
        }
    }

    /// Parses an Asaas `cycle` back into an interval.
    pub fn from_asaas_cycle(cycle: &str) -> Option<Self> {
        match cycle {
            "WEEKLY" => Some(BillingInterval::Week),
            "MONTHLY" => Some(BillingInterval::Month),
            "YEARLY" => Some(BillingInterval::Year),
            _ => None,
        }
    }
}

impl fmt::Display for BillingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingInterval {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "week" => Ok(BillingInterval::Week),
            "month" => Ok(BillingInterval::Month),
            "year" => Ok(BillingInterval::Year),
            other => Err(ValidationError::invalid_format(
                "interval",
                format!("expected week, month or year, got '{}'", other),
            )),
        }
    }
}

/// A purchasable plan.
///
/// `stripe_price_id` is absent for plans that were created before Stripe
/// pricing existed; those can only be sold through Asaas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: PlanId,
    pub name: String,
    pub description: Option<String>,
    pub features: Vec<String>,
    pub price: Money,
    pub interval: BillingInterval,
    pub stripe_price_id: Option<String>,
    pub active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Plan {
    /// Creates a new active plan.
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        features: Vec<String>,
        price: Money,
        interval: BillingInterval,
        stripe_price_id: Option<String>,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name", "Plan name is required"));
        }
        let now = Timestamp::now();
        Ok(Self {
            id: PlanId::new(),
            name,
            description,
            features,
            price,
            interval,
            stripe_price_id,
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns the Stripe price id or a validation error naming the plan.
    pub fn require_stripe_price(&self) -> Result<&str, DomainError> {
        self.stripe_price_id.as_deref().ok_or_else(|| {
            DomainError::validation("planId", "Plan has no Stripe price configured")
                .with_detail("plan_id", self.id.to_string())
        })
    }
}
