//! Application layer - Commands, Queries, and Handlers.
//!
//! Handlers orchestrate the billing domain over injected ports. Provider
//! differences live behind [`providers::BillingProviders`]; per-user
//! serialization of lifecycle commands lives in [`user_locks::UserLocks`].

pub mod handlers;
pub mod providers;
pub mod user_locks;

pub use providers::{AsaasBilling, BillingProviders, StripeBilling};
pub use user_locks::UserLocks;
