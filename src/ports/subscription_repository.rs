//! Subscription repository port.
//!
//! A subscription and its provider cache are one aggregate and are always
//! written together. Writes that also carry a payment happen in the same
//! transaction, so a failed write never leaves a subscription without its
//! first charge.
//!
//! # Single slot
//!
//! At most one subscription per user may be `PENDING` or `ACTIVE`.
//! Implementations enforce this with a conditional write (a partial unique
//! index in Postgres) and report a violation as
//! `ErrorCode::SubscriptionAlreadyActive`.
//!
//! # Versions
//!
//! `update` only succeeds when the stored version matches the one the
//! caller read, and bumps it. A writer holding an older copy gets
//! `ErrorCode::ConcurrentModification` and must reload before retrying.

use async_trait::async_trait;

use crate::domain::billing::{Payment, Provider, Subscription};
use crate::domain::foundation::{DomainError, SubscriptionId, UserId};

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Insert a new subscription, plus its first payment when there is one.
    ///
    /// # Errors
    ///
    /// - `SubscriptionAlreadyActive` if the user already holds the slot
    /// - `DatabaseError` on persistence failure
    async fn insert(
        &self,
        subscription: &Subscription,
        first_payment: Option<&Payment>,
    ) -> Result<(), DomainError>;

    /// Persist changes to a subscription, plus a newly created payment.
    ///
    /// # Errors
    ///
    /// - `SubscriptionNotFound` if the subscription does not exist
    /// - `SubscriptionAlreadyActive` if the update would take a held slot
    /// - `ConcurrentModification` if the row was written since it was read
    /// - `DatabaseError` on persistence failure
    async fn update(
        &self,
        subscription: &Subscription,
        new_payment: Option<&Payment>,
    ) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError>;

    /// The user's `PENDING` or `ACTIVE` subscription.
    async fn find_current_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError>;

    /// The user's most recently created subscription, whatever its status.
    async fn find_latest_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError>;

    /// The user's most recent soft-cancelled subscription.
    async fn find_reactivatable_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError>;

    /// Look up by the provider-side id, matching a pending placeholder as
    /// well as a confirmed id.
    async fn find_by_provider_reference(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Subscription>, DomainError>;
}
