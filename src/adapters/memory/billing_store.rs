//! Subscriptions and their payments in one store, so a subscription write
//! and its payment land together the way the database transaction does.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::billing::{Payment, Provider, Subscription};
use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionId, UserId};
use crate::ports::{PaymentRepository, SubscriptionRepository};

#[derive(Default)]
struct State {
    /// Insertion order; later entries are newer.
    subscriptions: Vec<Subscription>,
    payments: Vec<Payment>,
}

impl State {
    fn check_slot(&self, subscription: &Subscription) -> Result<(), DomainError> {
        if !subscription.status.holds_slot() {
            return Ok(());
        }
        let taken = self.subscriptions.iter().any(|s| {
            s.id != subscription.id && s.user_id == subscription.user_id && s.status.holds_slot()
        });
        if taken {
            return Err(DomainError::new(
                ErrorCode::SubscriptionAlreadyActive,
                "User already has a pending or active subscription",
            )
            .with_detail("user_id", subscription.user_id.to_string()));
        }
        Ok(())
    }

    fn insert_payment(&mut self, payment: &Payment) {
        if !self
            .payments
            .iter()
            .any(|p| p.provider_payment_id == payment.provider_payment_id)
        {
            self.payments.push(payment.clone());
        }
    }

    fn newest_for_user<F>(&self, user_id: &UserId, filter: F) -> Option<Subscription>
    where
        F: Fn(&Subscription) -> bool,
    {
        self.subscriptions
            .iter()
            .rev()
            .find(|s| &s.user_id == user_id && filter(s))
            .cloned()
    }
}

/// In-memory subscription and payment repository.
#[derive(Default)]
pub struct InMemoryBillingStore {
    state: RwLock<State>,
}

impl InMemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.read().subscriptions.clone()
    }

    pub fn payments(&self) -> Vec<Payment> {
        self.read().payments.clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state
            .read()
            .expect("InMemoryBillingStore: lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state
            .write()
            .expect("InMemoryBillingStore: lock poisoned")
    }
}

#[async_trait]
impl SubscriptionRepository for InMemoryBillingStore {
    async fn insert(
        &self,
        subscription: &Subscription,
        first_payment: Option<&Payment>,
    ) -> Result<(), DomainError> {
        let mut state = self.write();
        state.check_slot(subscription)?;
        state.subscriptions.push(subscription.clone());
        if let Some(payment) = first_payment {
            state.insert_payment(payment);
        }
        Ok(())
    }

    async fn update(
        &self,
        subscription: &Subscription,
        new_payment: Option<&Payment>,
    ) -> Result<(), DomainError> {
        let mut state = self.write();
        state.check_slot(subscription)?;
        let stored = state
            .subscriptions
            .iter_mut()
            .find(|s| s.id == subscription.id)
            .ok_or_else(|| {
                DomainError::not_found(
                    ErrorCode::SubscriptionNotFound,
                    "Subscription",
                    subscription.id,
                )
            })?;
        if stored.version != subscription.version {
            return Err(DomainError::new(
                ErrorCode::ConcurrentModification,
                "Subscription was modified by another writer",
            )
            .with_detail("subscription_id", subscription.id.to_string()));
        }
        *stored = Subscription {
            version: subscription.version + 1,
            ..subscription.clone()
        };
        if let Some(payment) = new_payment {
            state.insert_payment(payment);
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        Ok(self.read().subscriptions.iter().find(|s| &s.id == id).cloned())
    }

    async fn find_current_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self.read().newest_for_user(user_id, |s| s.status.holds_slot()))
    }

    async fn find_latest_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self.read().newest_for_user(user_id, |_| true))
    }

    async fn find_reactivatable_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self
            .read()
            .newest_for_user(user_id, |s| s.is_soft_cancelled()))
    }

    async fn find_by_provider_reference(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self
            .read()
            .subscriptions
            .iter()
            .find(|s| {
                s.provider == provider
                    && s.provider_subscription.reference.external_id() == external_id
            })
            .cloned())
    }
}

#[async_trait]
impl PaymentRepository for InMemoryBillingStore {
    async fn find_by_provider_id(
        &self,
        provider_payment_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        Ok(self
            .read()
            .payments
            .iter()
            .find(|p| p.provider_payment_id == provider_payment_id)
            .cloned())
    }

    async fn find_for_user(
        &self,
        user_id: &UserId,
        provider_payment_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        let state = self.read();
        Ok(state
            .payments
            .iter()
            .find(|p| {
                p.provider_payment_id == provider_payment_id
                    && state
                        .subscriptions
                        .iter()
                        .any(|s| s.id == p.subscription_id && &s.user_id == user_id)
            })
            .cloned())
    }

    async fn list_for_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<Payment>, DomainError> {
        let mut payments: Vec<Payment> = self
            .read()
            .payments
            .iter()
            .filter(|p| &p.subscription_id == subscription_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.created_at.cmp(&b.created_at)));
        Ok(payments)
    }

    async fn latest_for_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Option<Payment>, DomainError> {
        Ok(self.list_for_subscription(subscription_id).await?.pop())
    }

    async fn insert(&self, payment: &Payment) -> Result<(), DomainError> {
        self.write().insert_payment(payment);
        Ok(())
    }

    async fn update(&self, payment: &Payment) -> Result<(), DomainError> {
        let mut state = self.write();
        let stored = state
            .payments
            .iter_mut()
            .find(|p| p.provider_payment_id == payment.provider_payment_id)
            .ok_or_else(|| {
                DomainError::not_found(
                    ErrorCode::PaymentNotFound,
                    "Payment",
                    &payment.provider_payment_id,
                )
            })?;
        *stored = payment.clone();
        Ok(())
    }
}
