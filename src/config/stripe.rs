//! Stripe configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

/// Stripe API and webhook settings
#[derive(Debug, Clone, Deserialize)]
pub struct StripeConfig {
    /// Secret API key (sk_test_... or sk_live_...)
    pub secret_key: SecretString,

    /// Webhook signing secret (whsec_...)
    pub webhook_secret: SecretString,

    /// API base URL override, for stripe-mock and tests
    pub api_base_url: Option<String>,

    /// Currency for new prices
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl StripeConfig {
    pub fn new(secret_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            secret_key: SecretString::new(secret_key.into()),
            webhook_secret: SecretString::new(webhook_secret.into()),
            api_base_url: None,
            currency: default_currency(),
        }
    }

    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.secret_key.expose_secret().starts_with("sk_test_")
    }

    /// Validate Stripe configuration
    ///
    /// Test keys are refused in production.
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        let key = self.secret_key.expose_secret();
        let webhook_secret = self.webhook_secret.expose_secret();

        if key.is_empty() {
            return Err(ValidationError::MissingRequired("JOBBOARD__STRIPE__SECRET_KEY"));
        }
        if webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired(
                "JOBBOARD__STRIPE__WEBHOOK_SECRET",
            ));
        }

        // Verify key prefixes for safety
        if !key.starts_with("sk_") && !key.starts_with("rk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        if *environment == Environment::Production && self.is_test_mode() {
            return Err(ValidationError::StripeTestKeyInProduction);
        }

        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidCurrency);
        }
        if let Some(url) = &self.api_base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ValidationError::InvalidBaseUrl);
            }
        }

        Ok(())
    }
}

fn default_currency() -> String {
    "brl".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> StripeConfig {
        StripeConfig::new("sk_test_abcd1234", "whsec_xyz789")
    }

    #[test]
    fn test_valid_config() {
        let config = valid();
        assert!(config.is_test_mode());
        assert_eq!(config.currency, "brl");
        assert!(config.validate(&Environment::Development).is_ok());
    }

    #[test]
    fn test_missing_key() {
        let config = StripeConfig::new("", "whsec_xyz789");
        assert!(matches!(
            config.validate(&Environment::Development),
            Err(ValidationError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_publishable_key_is_rejected() {
        let config = StripeConfig::new("pk_test_xxx", "whsec_xyz789");
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::InvalidStripeKey)
        );
    }

    #[test]
    fn test_invalid_webhook_secret_prefix() {
        let config = StripeConfig::new("sk_test_xxx", "secret_xxx");
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::InvalidStripeWebhookSecret)
        );
    }

    #[test]
    fn test_test_key_refused_in_production() {
        assert_eq!(
            valid().validate(&Environment::Production),
            Err(ValidationError::StripeTestKeyInProduction)
        );
        let live = StripeConfig::new("sk_live_xxx", "whsec_xyz789");
        assert!(live.validate(&Environment::Production).is_ok());
    }

    #[test]
    fn test_invalid_currency() {
        let config = StripeConfig {
            currency: "real".to_string(),
            ..valid()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::InvalidCurrency)
        );
    }

    #[test]
    fn test_base_url_must_be_http() {
        let config = StripeConfig {
            api_base_url: Some("localhost:12111".to_string()),
            ..valid()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::InvalidBaseUrl)
        );
    }
}
