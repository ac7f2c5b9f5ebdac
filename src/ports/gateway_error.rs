//! Errors returned by payment provider gateways.

use serde::{Deserialize, Serialize};

use crate::domain::billing::{BillingError, Provider};

/// Errors from payment provider operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayError {
    /// Error code for categorization.
    pub code: GatewayErrorCode,

    /// Human-readable message (may include provider response text).
    pub message: String,

    /// Provider's error code (if available).
    pub provider_code: Option<String>,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl GatewayError {
    /// Create a new gateway error.
    pub fn new(code: GatewayErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    /// Attach the provider's own error code.
    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::NetworkError, message)
    }

    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::AuthenticationError, message)
    }

    /// Create a not found error.
    pub fn not_found(resource: &str) -> Self {
        Self::new(GatewayErrorCode::NotFound, format!("{} not found", resource))
    }

    /// Create a rate limit error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::RateLimitExceeded, message)
    }

    /// The provider rejected the request.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::ProviderError, message)
    }

    /// The provider answered with something we could not read.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::InvalidResponse, message)
    }

    /// Wraps this error as a billing error for the given provider.
    pub fn into_billing(self, provider: Provider) -> BillingError {
        BillingError::provider(provider, self.to_string())
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(code) = &self.provider_code {
            write!(f, " ({})", code)?;
        }
        Ok(())
    }
}

impl std::error::Error for GatewayError {}

/// Gateway error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorCode {
    /// Network connectivity issue or timeout.
    NetworkError,

    /// API key rejected.
    AuthenticationError,

    /// Resource not found.
    NotFound,

    /// Rate limit exceeded.
    RateLimitExceeded,

    /// Provider returned 5xx.
    ServiceUnavailable,

    /// Provider rejected the request (4xx).
    ProviderError,

    /// Response body did not match the expected shape.
    InvalidResponse,
}

impl GatewayErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayErrorCode::NetworkError
                | GatewayErrorCode::RateLimitExceeded
                | GatewayErrorCode::ServiceUnavailable
        )
    }
}

impl std::fmt::Display for GatewayErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GatewayErrorCode::NetworkError => "network_error",
            GatewayErrorCode::AuthenticationError => "authentication_error",
            GatewayErrorCode::NotFound => "not_found",
            GatewayErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            GatewayErrorCode::ServiceUnavailable => "service_unavailable",
            GatewayErrorCode::ProviderError => "provider_error",
            GatewayErrorCode::InvalidResponse => "invalid_response",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_error_retryable() {
        assert!(GatewayError::network("timeout").retryable);
        assert!(GatewayError::rate_limited("slow down").retryable);
        assert!(GatewayError::new(GatewayErrorCode::ServiceUnavailable, "502").retryable);

        assert!(!GatewayError::provider("invalid value").retryable);
        assert!(!GatewayError::not_found("subscription").retryable);
    }

    #[test]
    fn gateway_error_display_includes_provider_code() {
        let err = GatewayError::provider("No such price").with_provider_code("resource_missing");
        let text = err.to_string();
        assert!(text.contains("provider_error"));
        assert!(text.contains("No such price"));
        assert!(text.contains("resource_missing"));
    }

    #[test]
    fn into_billing_keeps_detail_for_logs() {
        let err = GatewayError::provider("invalid_cpfCnpj").into_billing(Provider::Asaas);
        assert!(matches!(err, BillingError::Provider { provider: Provider::Asaas, .. }));
        assert!(err.detail().contains("invalid_cpfCnpj"));
    }
}
