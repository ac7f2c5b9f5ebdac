//! Session validation port.
//!
//! Turns a bearer token into the internal user who owns subscriptions.
//! Implementations must verify the token signature, audience and expiry,
//! then resolve the token subject through the user directory.

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser};

/// Validates access tokens and extracts user identity.
///
/// # Contract
///
/// - `AuthError::InvalidToken` for malformed or badly signed tokens
/// - `AuthError::TokenExpired` for expired tokens
/// - `AuthError::UserNotFound` when no internal user matches the subject
/// - `AuthError::ServiceUnavailable` for transient lookup failures
#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// Validate a raw token (without the "Bearer " prefix).
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}
