//! PostgreSQL adapters - sqlx implementations of the persistence ports.
//!
//! - `PostgresSubscriptionRepository` - subscriptions with their provider cache
//! - `PostgresPaymentRepository` - Asaas charges and cached PIX codes
//! - `PostgresPlanRepository` - plan catalog
//! - `PostgresCustomerRepository` - provider customer links
//! - `PostgresUserDirectory` - read-only view of users
//! - `PostgresWebhookEventRepository` - webhook ledger
//!
//! Schema lives in `migrations/`.

mod customer_repository;
mod payment_repository;
mod plan_repository;
mod subscription_repository;
mod user_directory;
mod webhook_event_repository;

pub use customer_repository::PostgresCustomerRepository;
pub use payment_repository::PostgresPaymentRepository;
pub use plan_repository::PostgresPlanRepository;
pub use subscription_repository::PostgresSubscriptionRepository;
pub use user_directory::PostgresUserDirectory;
pub use webhook_event_repository::PostgresWebhookEventRepository;

use std::fmt;

use crate::domain::foundation::{DomainError, ErrorCode};

/// A stored value that no longer parses into its domain type.
fn corrupt_column(column: &str, err: impl fmt::Display) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Invalid {} value: {}", column, err),
    )
}

/// Wraps a driver error with what was being attempted.
fn query_failed(action: &str, err: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("Failed to {}: {}", action, err))
}

/// Name of the violated unique constraint, if that is what failed.
fn violated_constraint(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => db_err.constraint(),
        _ => None,
    }
}
