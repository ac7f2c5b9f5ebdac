//! Payment repository port (Asaas charges).

use async_trait::async_trait;

use crate::domain::billing::Payment;
use crate::domain::foundation::{DomainError, SubscriptionId, UserId};

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn find_by_provider_id(
        &self,
        provider_payment_id: &str,
    ) -> Result<Option<Payment>, DomainError>;

    /// A payment by provider id, only if it belongs to one of the user's
    /// subscriptions.
    async fn find_for_user(
        &self,
        user_id: &UserId,
        provider_payment_id: &str,
    ) -> Result<Option<Payment>, DomainError>;

    /// All payments of a subscription, earliest due date first.
    async fn list_for_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<Payment>, DomainError>;

    /// The payment with the latest due date.
    async fn latest_for_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Option<Payment>, DomainError>;

    /// Insert a payment. Inserting a provider payment id that already exists
    /// is a no-op.
    async fn insert(&self, payment: &Payment) -> Result<(), DomainError>;

    /// Persist status and PIX changes.
    ///
    /// # Errors
    ///
    /// - `PaymentNotFound` if the payment does not exist
    async fn update(&self, payment: &Payment) -> Result<(), DomainError>;
}
