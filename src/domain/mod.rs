//! Domain layer containing business logic and domain types.
//!
//! - `foundation` - Shared primitives (IDs, money, timestamps, errors, auth)
//! - `billing` - Plans, subscriptions, payments and provider event handling

pub mod billing;
pub mod foundation;
