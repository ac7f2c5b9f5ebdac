//! Supabase adapter for access token validation.
//!
//! Supabase signs access tokens with the project's JWT secret (HS256). This
//! adapter implements the `SessionValidator` port by:
//!
//! 1. Verifying the signature with the shared secret
//! 2. Validating audience and expiry claims
//! 3. Resolving the `sub` claim to an internal user through `UserDirectory`
//!
//! # Example
//!
//! ```ignore
//! use jobboard_billing::adapters::auth::{SupabaseConfig, SupabaseSessionValidator};
//!
//! let config = SupabaseConfig::new(jwt_secret, "authenticated");
//! let validator = SupabaseSessionValidator::new(config, users);
//! let user = validator.validate("eyJ...").await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{AuthError, AuthenticatedUser};
use crate::ports::{SessionValidator, UserDirectory};

/// Audience Supabase puts on tokens of signed-in users.
pub const DEFAULT_AUDIENCE: &str = "authenticated";

/// Configuration for the Supabase adapter.
#[derive(Clone)]
pub struct SupabaseConfig {
    /// Project JWT secret used to sign access tokens.
    jwt_secret: SecretString,

    /// Expected audience claim.
    audience: String,
}

impl SupabaseConfig {
    pub fn new(jwt_secret: SecretString, audience: impl Into<String>) -> Self {
        Self {
            jwt_secret,
            audience: audience.into(),
        }
    }
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("audience", &self.audience)
            .finish()
    }
}

/// Claims read from a Supabase access token.
#[derive(Debug, Serialize, Deserialize)]
struct SupabaseClaims {
    /// Auth user id.
    sub: String,

    /// Expiry timestamp (Unix epoch seconds)
    exp: i64,

    #[serde(default)]
    email: Option<String>,
}

/// Supabase session validator.
pub struct SupabaseSessionValidator {
    config: SupabaseConfig,
    decoding_key: DecodingKey,
    users: Arc<dyn UserDirectory>,
}

impl SupabaseSessionValidator {
    pub fn new(config: SupabaseConfig, users: Arc<dyn UserDirectory>) -> Self {
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.expose_secret().as_bytes());
        Self {
            config,
            decoding_key,
            users,
        }
    }

    fn validate_token(&self, token: &str) -> Result<SupabaseClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.config.audience]);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub", "aud"]);

        decode::<SupabaseClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                use jsonwebtoken::errors::ErrorKind;
                match e.kind() {
                    ErrorKind::ExpiredSignature => {
                        tracing::debug!("Token expired");
                        AuthError::TokenExpired
                    }
                    ErrorKind::InvalidAudience => {
                        tracing::warn!("Invalid audience in token");
                        AuthError::InvalidToken
                    }
                    _ => {
                        tracing::debug!("Token validation failed: {}", e);
                        AuthError::InvalidToken
                    }
                }
            })
    }
}

#[async_trait]
impl SessionValidator for SupabaseSessionValidator {
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let claims = self.validate_token(token)?;

        let profile = self
            .users
            .find_by_auth_subject(&claims.sub)
            .await
            .map_err(|e| AuthError::service_unavailable(e.to_string()))?
            .ok_or_else(|| {
                tracing::warn!(subject = %claims.sub, "No user linked to token subject");
                AuthError::UserNotFound
            })?;

        let display_name = Some(profile.name).filter(|name| !name.trim().is_empty());
        Ok(AuthenticatedUser::new(
            profile.id,
            claims.sub,
            claims.email.unwrap_or(profile.email),
            display_name,
        ))
    }
}

impl std::fmt::Debug for SupabaseSessionValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseSessionValidator")
            .field("audience", &self.config.audience)
            .finish_non_exhaustive()
    }
}
