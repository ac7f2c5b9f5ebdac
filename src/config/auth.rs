//! Authentication configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;

/// Supabase access token settings
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Project JWT secret (Settings → API → JWT Secret)
    pub supabase_jwt_secret: SecretString,

    /// Audience claim expected on user tokens
    #[serde(default = "default_audience")]
    pub audience: String,
}

impl AuthConfig {
    pub fn new(supabase_jwt_secret: impl Into<String>) -> Self {
        Self {
            supabase_jwt_secret: SecretString::new(supabase_jwt_secret.into()),
            audience: default_audience(),
        }
    }

    /// Validate authentication configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let secret = self.supabase_jwt_secret.expose_secret();
        if secret.is_empty() {
            return Err(ValidationError::MissingRequired(
                "JOBBOARD__AUTH__SUPABASE_JWT_SECRET",
            ));
        }
        if secret.len() < 32 {
            return Err(ValidationError::WeakJwtSecret);
        }
        if self.audience.trim().is_empty() {
            return Err(ValidationError::MissingRequired("JOBBOARD__AUTH__AUDIENCE"));
        }
        Ok(())
    }
}

fn default_audience() -> String {
    "authenticated".to_string()
}
