//! Billing error taxonomy.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | ValidationFailed | 400 |
//! | Conflict | 400 |
//! | Unauthorized | 401 |
//! | NotFound | 404 |
//! | Provider | 500 |
//! | Infrastructure | 500 |
//!
//! `Inconsistency` never reaches a client: webhook handlers log it and
//! acknowledge the delivery so the provider stops retrying.

use crate::domain::foundation::{DomainError, ErrorCode};

use super::Provider;

/// Billing-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingError {
    /// Missing or invalid request field.
    ValidationFailed { field: String, message: String },

    /// Missing or invalid user.
    Unauthorized(String),

    /// Plan, subscription, payment or customer absent.
    NotFound { resource: String, message: String },

    /// Duplicate active subscription or an operation the current state forbids.
    Conflict(String),

    /// A provider call failed. `detail` is for logs only.
    Provider { provider: Provider, detail: String },

    /// A webhook referenced local state that does not exist or cannot move.
    Inconsistency(String),

    /// Persistence or other infrastructure failure.
    Infrastructure(String),
}

impl BillingError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BillingError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        BillingError::Unauthorized(message.into())
    }

    pub fn not_found(resource: impl Into<String>, message: impl Into<String>) -> Self {
        BillingError::NotFound {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn plan_not_found() -> Self {
        Self::not_found("plan", "Plan not found")
    }

    pub fn subscription_not_found() -> Self {
        Self::not_found("subscription", "Subscription not found")
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        BillingError::Conflict(message.into())
    }

    pub fn already_subscribed() -> Self {
        Self::conflict("User already has an active subscription")
    }

    pub fn provider(provider: Provider, detail: impl Into<String>) -> Self {
        BillingError::Provider {
            provider,
            detail: detail.into(),
        }
    }

    pub fn inconsistency(message: impl Into<String>) -> Self {
        BillingError::Inconsistency(message.into())
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        BillingError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            BillingError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            BillingError::Unauthorized(_) => ErrorCode::Unauthorized,
            BillingError::NotFound { .. } => ErrorCode::NotFound,
            BillingError::Conflict(_) => ErrorCode::SubscriptionAlreadyActive,
            BillingError::Provider { .. } => ErrorCode::ProviderError,
            BillingError::Inconsistency(_) => ErrorCode::InternalError,
            BillingError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Message safe to show a client. Provider and infrastructure detail is withheld.
    pub fn message(&self) -> String {
        match self {
            BillingError::ValidationFailed { message, .. } => message.clone(),
            BillingError::Unauthorized(message) => message.clone(),
            BillingError::NotFound { message, .. } => message.clone(),
            BillingError::Conflict(message) => message.clone(),
            BillingError::Provider { .. } => "Payment provider request failed".to_string(),
            BillingError::Inconsistency(_) | BillingError::Infrastructure(_) => {
                "Internal server error".to_string()
            }
        }
    }

    /// Full detail for server-side logs.
    pub fn detail(&self) -> String {
        match self {
            BillingError::ValidationFailed { field, message } => {
                format!("validation failed for '{}': {}", field, message)
            }
            BillingError::Provider { provider, detail } => {
                format!("{} request failed: {}", provider, detail)
            }
            BillingError::Inconsistency(message) => format!("inconsistency: {}", message),
            BillingError::Infrastructure(message) => format!("infrastructure: {}", message),
            other => other.message(),
        }
    }

    /// Returns true if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BillingError::Infrastructure(_))
    }
}

impl std::fmt::Display for BillingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.detail())
    }
}

impl std::error::Error for BillingError {}

impl From<DomainError> for BillingError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed | ErrorCode::EmptyField | ErrorCode::InvalidFormat => {
                let field = err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string());
                BillingError::ValidationFailed {
                    field,
                    message: err.message,
                }
            }
            ErrorCode::NotFound => BillingError::not_found("resource", err.message),
            ErrorCode::UserNotFound => BillingError::not_found("user", err.message),
            ErrorCode::PlanNotFound => BillingError::not_found("plan", err.message),
            ErrorCode::SubscriptionNotFound => {
                BillingError::not_found("subscription", err.message)
            }
            ErrorCode::PaymentNotFound => BillingError::not_found("payment", err.message),
            ErrorCode::CustomerNotFound => BillingError::not_found("customer", err.message),
            ErrorCode::SubscriptionAlreadyActive => BillingError::already_subscribed(),
            ErrorCode::InvalidStateTransition => BillingError::Conflict(err.message),
            // Another writer got there first; the caller retries on fresh state.
            ErrorCode::ConcurrentModification => BillingError::Infrastructure(err.to_string()),
            ErrorCode::Unauthorized => BillingError::Unauthorized(err.message),
            ErrorCode::ProviderError => BillingError::Infrastructure(err.to_string()),
            ErrorCode::DatabaseError | ErrorCode::InternalError => {
                BillingError::Infrastructure(err.to_string())
            }
        }
    }
}
