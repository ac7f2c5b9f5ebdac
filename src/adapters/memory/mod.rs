//! In-memory implementations of the persistence and identity ports.
//!
//! Used by unit and integration tests. They enforce the same constraints as the
//! PostgreSQL adapters (one live subscription per user, idempotent payment
//! and customer inserts) so handler tests exercise the real failure modes.
//!
//! # Panics
//!
//! Methods panic if an internal lock is poisoned.

mod billing_store;
mod catalog;
mod identity;
mod webhook_events;

pub use billing_store::InMemoryBillingStore;
pub use catalog::{InMemoryCustomerRepository, InMemoryPlanRepository};
pub use identity::{InMemoryUserDirectory, StaticSessionValidator};
pub use webhook_events::InMemoryWebhookEventRepository;
