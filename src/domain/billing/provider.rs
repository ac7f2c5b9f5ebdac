//! Payment provider identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// External processor that owns a subscription's money movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Provider {
    /// Card subscriptions through Stripe Checkout.
    Stripe,
    /// PIX subscriptions through Asaas.
    Asaas,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Stripe => "STRIPE",
            Provider::Asaas => "ASAAS",
        }
    }

    /// Whether the customer can manage the payment method self-service.
    ///
    /// Stripe exposes a billing portal; PIX charges are paid one by one.
    pub fn can_update_payment_method(&self) -> bool {
        matches!(self, Provider::Stripe)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "STRIPE" => Ok(Provider::Stripe),
            "ASAAS" => Ok(Provider::Asaas),
            _ => Err(ValidationError::invalid_format(
                "provider",
                format!("unknown provider '{}'", s),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("stripe".parse::<Provider>().unwrap(), Provider::Stripe);
        assert_eq!("ASAAS".parse::<Provider>().unwrap(), Provider::Asaas);
        assert!("paypal".parse::<Provider>().is_err());
    }

    #[test]
    fn serializes_upper_case() {
        assert_eq!(serde_json::to_string(&Provider::Asaas).unwrap(), "\"ASAAS\"");
        let p: Provider = serde_json::from_str("\"STRIPE\"").unwrap();
        assert_eq!(p, Provider::Stripe);
    }

    #[test]
    fn only_stripe_allows_payment_method_updates() {
        assert!(Provider::Stripe.can_update_payment_method());
        assert!(!Provider::Asaas.can_update_payment_method());
    }
}
