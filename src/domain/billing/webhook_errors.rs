//! Webhook error types.
//!
//! Status codes decide provider retry behaviour: 2xx acknowledges, 4xx
//! rejects without retry, 5xx asks the provider to deliver again.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors that occur while accepting a provider webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature or shared token did not match.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Signed timestamp is older than the tolerance window.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Signed timestamp is in the future beyond clock skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Failed to parse the payload or signature header.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Required field missing from the payload.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Local state could not be read or written.
    #[error("Database error: {0}")]
    Database(String),

    /// Applying the event failed in a way a redelivery may fix.
    #[error("Processing failed: {0}")]
    Processing(String),
}

impl WebhookError {
    /// Returns true if the provider should retry delivering this webhook.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::Database(_) | WebhookError::Processing(_))
    }

    /// Maps the error to the HTTP status returned to the provider.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature
            | WebhookError::TimestampOutOfRange
            | WebhookError::InvalidTimestamp
            | WebhookError::ParseError(_)
            | WebhookError::MissingField(_) => StatusCode::BAD_REQUEST,

            WebhookError::Database(_) | WebhookError::Processing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
