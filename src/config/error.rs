//! Configuration errors

use thiserror::Error;

/// Startup configuration failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment could not be read or deserialized.
    #[error("Could not load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] ValidationError),
}

/// A loaded value that is unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} must be set")]
    MissingRequired(&'static str),

    // server
    #[error("server host and port do not form a socket address")]
    InvalidAddress,
    #[error("server port must be non-zero")]
    InvalidPort,
    #[error("request timeout must be between 1 and 300 seconds")]
    InvalidTimeout,

    // database
    #[error("database URL must start with postgres:// or postgresql://")]
    InvalidDatabaseUrl,
    #[error("database min_connections exceeds max_connections")]
    InvalidPoolSize,
    #[error("database max_connections exceeds 100")]
    PoolSizeTooLarge,

    // auth
    #[error("Supabase JWT secret must be at least 32 characters")]
    WeakJwtSecret,

    // providers
    #[error("Stripe secret key must start with sk_ or rk_")]
    InvalidStripeKey,
    #[error("Stripe webhook secret must start with whsec_")]
    InvalidStripeWebhookSecret,
    #[error("Stripe test key configured in production")]
    StripeTestKeyInProduction,
    #[error("currency must be a three-letter ISO code")]
    InvalidCurrency,
    #[error("provider base URL must be an http(s) URL")]
    InvalidBaseUrl,
    #[error("fallback tax id must be a CPF (11 digits) or CNPJ (14 digits)")]
    InvalidTaxId,
}
