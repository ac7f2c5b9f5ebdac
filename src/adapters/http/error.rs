//! Error responses shared by every router.
//!
//! Clients always receive `{"error": message, "code": CODE}`. Provider and
//! infrastructure detail is logged here and never serialized.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::billing::{BillingError, WebhookError};
use crate::domain::foundation::{DomainError, ValidationError};

/// JSON error body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub error: String,
    /// Stable code for programmatic handling.
    pub code: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Billing API errors
// ════════════════════════════════════════════════════════════════════════════════

/// Wrapper that renders [`BillingError`] as an HTTP response.
#[derive(Debug)]
pub struct BillingApiError(pub(crate) BillingError);

impl BillingApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            BillingError::ValidationFailed { .. } | BillingError::Conflict(_) => {
                StatusCode::BAD_REQUEST
            }
            BillingError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            BillingError::NotFound { .. } => StatusCode::NOT_FOUND,
            BillingError::Provider { .. }
            | BillingError::Inconsistency(_)
            | BillingError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BillingError> for BillingApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl From<DomainError> for BillingApiError {
    fn from(err: DomainError) -> Self {
        Self(err.into())
    }
}

impl From<ValidationError> for BillingApiError {
    fn from(err: ValidationError) -> Self {
        Self(DomainError::from(err).into())
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = %self.0.code(), error = %self.0.detail(), "Request failed");
        } else {
            tracing::debug!(code = %self.0.code(), error = %self.0.detail(), "Request rejected");
        }

        let body = ErrorResponse::new(self.0.code().to_string(), self.0.message());
        (status, Json(body)).into_response()
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook errors
// ════════════════════════════════════════════════════════════════════════════════

/// Wrapper that renders [`WebhookError`] for the provider.
///
/// 4xx tells the provider to stop retrying, 5xx asks for redelivery.
#[derive(Debug)]
pub struct WebhookApiError(pub(crate) WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let (code, message) = if self.0.is_retryable() {
            tracing::error!(error = %self.0, "Webhook processing failed");
            ("WEBHOOK_FAILED", "Webhook processing failed".to_string())
        } else {
            tracing::warn!(error = %self.0, "Webhook rejected");
            ("WEBHOOK_REJECTED", self.0.to_string())
        };

        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}
