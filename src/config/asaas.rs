//! Asaas configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use crate::adapters::asaas::{PRODUCTION_BASE_URL, SANDBOX_BASE_URL};

/// Which Asaas environment the API key belongs to
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AsaasEnvironment {
    #[default]
    Sandbox,
    Production,
}

/// Asaas API and webhook settings
#[derive(Debug, Clone, Deserialize)]
pub struct AsaasConfig {
    /// API key sent in the `access_token` header
    pub api_key: SecretString,

    #[serde(default)]
    pub environment: AsaasEnvironment,

    /// Base URL override; otherwise derived from `environment`
    pub base_url: Option<String>,

    /// Token Asaas sends in `asaas-access-token`. Unset accepts every delivery.
    pub webhook_token: Option<SecretString>,

    /// CPF/CNPJ used when a user has none on file
    pub fallback_tax_id: Option<String>,
}

impl AsaasConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            environment: AsaasEnvironment::default(),
            base_url: None,
            webhook_token: None,
            fallback_tax_id: None,
        }
    }

    pub fn base_url(&self) -> &str {
        match (&self.base_url, self.environment) {
            (Some(url), _) => url,
            (None, AsaasEnvironment::Sandbox) => SANDBOX_BASE_URL,
            (None, AsaasEnvironment::Production) => PRODUCTION_BASE_URL,
        }
    }

    /// The configured webhook token, if any and non-empty.
    pub fn webhook_token(&self) -> Option<String> {
        self.webhook_token
            .as_ref()
            .map(|t| t.expose_secret().trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// Validate Asaas configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.api_key.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("JOBBOARD__ASAAS__API_KEY"));
        }
        if let Some(url) = &self.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ValidationError::InvalidBaseUrl);
            }
        }
        if let Some(tax_id) = &self.fallback_tax_id {
            let digits = tax_id.chars().filter(|c| c.is_ascii_digit()).count();
            let only_digits_and_marks = tax_id
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '/'));
            if !only_digits_and_marks || (digits != 11 && digits != 14) {
                return Err(ValidationError::InvalidTaxId);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_follows_environment() {
        let mut config = AsaasConfig::new("$aact_key");
        assert_eq!(config.base_url(), SANDBOX_BASE_URL);

        config.environment = AsaasEnvironment::Production;
        assert_eq!(config.base_url(), PRODUCTION_BASE_URL);

        config.base_url = Some("http://localhost:4010".to_string());
        assert_eq!(config.base_url(), "http://localhost:4010");
    }

    #[test]
    fn blank_webhook_token_counts_as_unset() {
        let config = AsaasConfig {
            webhook_token: Some(SecretString::new("  ".to_string())),
            ..AsaasConfig::new("$aact_key")
        };
        assert!(config.webhook_token().is_none());
    }

    #[test]
    fn missing_api_key_is_rejected() {
        assert!(matches!(
            AsaasConfig::new("").validate(),
            Err(ValidationError::MissingRequired(_))
        ));
    }

    #[test]
    fn fallback_tax_id_must_be_cpf_or_cnpj() {
        let with = |tax_id: &str| AsaasConfig {
            fallback_tax_id: Some(tax_id.to_string()),
            ..AsaasConfig::new("$aact_key")
        };

        assert!(with("249.715.637-92").validate().is_ok());
        assert!(with("11.222.333/0001-81").validate().is_ok());
        assert_eq!(with("12345").validate(), Err(ValidationError::InvalidTaxId));
        assert_eq!(with("abc45678901").validate(), Err(ValidationError::InvalidTaxId));
    }
}
