//! Canonical subscription status state machine.
//!
//! `Pending` and `Active` both occupy the user's single subscription slot.
//! `Cancelled` may come back to life only through reactivation of a
//! soft-cancelled subscription; the aggregate enforces that part.

use crate::domain::foundation::{StateMachine, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of the canonical subscription record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    /// Awaiting checkout completion (Stripe) or first PIX payment (Asaas).
    Pending,

    /// Paid and current.
    Active,

    /// Ended, either immediately or at period end.
    Cancelled,
}

impl SubscriptionStatus {
    /// True for the statuses that count against the one-per-user limit.
    pub fn holds_slot(&self) -> bool {
        matches!(self, SubscriptionStatus::Pending | SubscriptionStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "PENDING",
            SubscriptionStatus::Active => "ACTIVE",
            SubscriptionStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(SubscriptionStatus::Pending),
            "ACTIVE" => Ok(SubscriptionStatus::Active),
            "CANCELLED" => Ok(SubscriptionStatus::Cancelled),
            other => Err(ValidationError::invalid_format(
                "subscription_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            // From PENDING
            (Pending, Active)
                | (Pending, Cancelled)
            // From ACTIVE
                | (Active, Cancelled)
                | (Active, Pending) // replacement charge after plan change
            // From CANCELLED
                | (Cancelled, Active) // Stripe reactivation or a recovered payment
                | (Cancelled, Pending) // Asaas reactivation
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Pending => vec![Active, Cancelled],
            Active => vec![Cancelled, Pending],
            Cancelled => vec![Active, Pending],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_can_transition_to_active() {
        let result = SubscriptionStatus::Pending.transition_to(SubscriptionStatus::Active);
        assert_eq!(result, Ok(SubscriptionStatus::Active));
    }

    #[test]
    fn self_transitions_are_not_state_changes() {
        for status in [
            SubscriptionStatus::Pending,
            SubscriptionStatus::Active,
            SubscriptionStatus::Cancelled,
        ] {
            assert!(!status.can_transition_to(&status));
        }
    }

    #[test]
    fn no_status_is_terminal() {
        assert!(!SubscriptionStatus::Cancelled.is_terminal());
    }

    #[test]
    fn can_transition_to_is_consistent_with_valid_transitions() {
        for status in [
            SubscriptionStatus::Pending,
            SubscriptionStatus::Active,
            SubscriptionStatus::Cancelled,
        ] {
            for target in status.valid_transitions() {
                assert!(status.can_transition_to(&target));
            }
        }
    }

    #[test]
    fn only_pending_and_active_hold_the_slot() {
        assert!(SubscriptionStatus::Pending.holds_slot());
        assert!(SubscriptionStatus::Active.holds_slot());
        assert!(!SubscriptionStatus::Cancelled.holds_slot());
    }

    #[test]
    fn parses_storage_representation() {
        assert_eq!(
            "CANCELLED".parse::<SubscriptionStatus>().unwrap(),
            SubscriptionStatus::Cancelled
        );
        assert!("cancelled".parse::<SubscriptionStatus>().is_err());
    }

    #[test]
    fn serializes_screaming_case() {
        let json = serde_json::to_string(&SubscriptionStatus::Active).unwrap();
        assert_eq!(json, "\"ACTIVE\"");
    }
}
