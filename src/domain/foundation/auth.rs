//! Authentication types for the domain layer.
//!
//! An `AuthenticatedUser` is what the bearer-token middleware hands to
//! request handlers once the token has been verified and the token subject
//! resolved to an internal user row.

use super::UserId;
use thiserror::Error;

/// Authenticated user resolved from a validated access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Internal user id (owner of subscriptions).
    pub id: UserId,

    /// Subject claim issued by the identity provider.
    pub auth_subject: String,

    /// User's email address.
    pub email: String,

    /// Display name if the user has one.
    pub display_name: Option<String>,
}

impl AuthenticatedUser {
    /// Creates a new authenticated user.
    pub fn new(
        id: UserId,
        auth_subject: impl Into<String>,
        email: impl Into<String>,
        display_name: Option<String>,
    ) -> Self {
        Self {
            id,
            auth_subject: auth_subject.into(),
            email: email.into(),
            display_name,
        }
    }

    /// Returns the user's display name, or email as fallback.
    pub fn display_name_or_email(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

/// Authentication errors that can occur during token validation.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// No bearer token on the request.
    #[error("Missing access token")]
    MissingToken,

    /// The token is malformed or has an invalid signature.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The token signature is valid but it has expired.
    #[error("Token expired")]
    TokenExpired,

    /// Token is valid but no internal user is linked to its subject.
    #[error("User not found")]
    UserNotFound,

    /// The user lookup failed for infrastructure reasons.
    #[error("Auth service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AuthError {
    /// Creates a service unavailable error with a message.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Returns true if this is a transient error that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::ServiceUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user_id() -> UserId {
        UserId::new("user-123").unwrap()
    }

    #[test]
    fn display_name_or_email_prefers_name() {
        let user = AuthenticatedUser::new(
            test_user_id(),
            "sb-uid-1",
            "test@example.com",
            Some("Alice".to_string()),
        );

        assert_eq!(user.display_name_or_email(), "Alice");
        assert_eq!(user.auth_subject, "sb-uid-1");
    }

    #[test]
    fn display_name_or_email_falls_back_to_email() {
        let user = AuthenticatedUser::new(test_user_id(), "sb-uid-2", "bob@example.com", None);

        assert_eq!(user.display_name_or_email(), "bob@example.com");
    }

    #[test]
    fn auth_error_service_unavailable_displays_message() {
        let err = AuthError::service_unavailable("Connection refused");
        assert_eq!(format!("{}", err), "Auth service unavailable: Connection refused");
        assert!(err.is_transient());
        assert!(!AuthError::InvalidToken.is_transient());
    }
}
