//! GetProviderSubscriptionHandler - a provider-specific view of the caller's
//! subscription, synced with the provider before it is returned.
//!
//! Backs `GET /api/asaas/subscriptions`, `GET /api/asaas/subscription/:id`
//! and `GET /api/stripe/subscription`. Unlike the billing page these fail
//! when the provider cannot be reached.

use std::sync::Arc;

use tracing::debug;

use crate::application::providers::BillingProviders;
use crate::application::user_locks::UserLocks;
use crate::domain::billing::{BillingError, Payment, Provider, Subscription};
use crate::domain::foundation::UserId;
use crate::ports::{ProviderSnapshot, StripeSubscriptionInfo, SubscriptionRepository};

/// Which subscription to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionLookup {
    /// The caller's pending or active subscription, if it is on this provider.
    Current,

    /// A provider subscription id, which must belong to the caller.
    ProviderId(String),
}

#[derive(Debug, Clone)]
pub struct GetProviderSubscriptionQuery {
    pub user_id: UserId,
    pub provider: Provider,
    pub lookup: SubscriptionLookup,
}

/// The subscription plus whatever the provider reported for it.
#[derive(Debug, Clone, Default)]
pub struct ProviderSubscriptionView {
    pub subscription: Option<Subscription>,
    pub snapshot: Option<ProviderSnapshot>,
}

impl ProviderSubscriptionView {
    /// Synced Asaas charges, earliest due first.
    pub fn payments(&self) -> Vec<Payment> {
        match &self.snapshot {
            Some(ProviderSnapshot::Asaas(snapshot)) => snapshot.payments.clone(),
            _ => Vec::new(),
        }
    }

    /// Stripe's own record, once the checkout has completed.
    pub fn stripe_details(&self) -> Option<StripeSubscriptionInfo> {
        match &self.snapshot {
            Some(ProviderSnapshot::Stripe(snapshot)) => snapshot.subscription.clone(),
            _ => None,
        }
    }
}

pub struct GetProviderSubscriptionHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    providers: BillingProviders,
    locks: Arc<UserLocks>,
}

impl GetProviderSubscriptionHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        providers: BillingProviders,
        locks: Arc<UserLocks>,
    ) -> Self {
        Self {
            subscriptions,
            providers,
            locks,
        }
    }

    pub async fn handle(
        &self,
        query: GetProviderSubscriptionQuery,
    ) -> Result<ProviderSubscriptionView, BillingError> {
        // 1. The sync below writes
        let _guard = self.locks.acquire(&query.user_id).await;

        // 2. Find it
        let found = match &query.lookup {
            SubscriptionLookup::Current => self
                .subscriptions
                .find_current_for_user(&query.user_id)
                .await?
                .filter(|s| s.provider == query.provider),
            SubscriptionLookup::ProviderId(id) => Some(
                self.subscriptions
                    .find_by_provider_reference(query.provider, id)
                    .await?
                    .filter(|s| s.user_id == query.user_id)
                    .ok_or_else(BillingError::subscription_not_found)?,
            ),
        };
        let Some(mut subscription) = found else {
            debug!(user_id = %query.user_id, provider = %query.provider, "No current subscription");
            return Ok(ProviderSubscriptionView::default());
        };

        // 3. Nothing to sync once we cancelled it ourselves
        if subscription.is_hard_cancelled() {
            return Ok(ProviderSubscriptionView {
                subscription: Some(subscription),
                snapshot: None,
            });
        }

        // 4. Sync with the provider and keep the result
        let snapshot = self
            .providers
            .get(subscription.provider)
            .refresh_status(&mut subscription)
            .await?;
        self.subscriptions.update(&subscription, None).await?;

        Ok(ProviderSubscriptionView {
            subscription: Some(subscription),
            snapshot: Some(snapshot),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::billing::test_support::Harness;
    use crate::domain::billing::SubscriptionStatus;
    use crate::ports::{asaas_status, GatewayError};

    fn handler(h: &Harness) -> GetProviderSubscriptionHandler {
        GetProviderSubscriptionHandler::new(h.store.clone(), h.providers.clone(), h.locks.clone())
    }

    fn current(provider: Provider) -> GetProviderSubscriptionQuery {
        GetProviderSubscriptionQuery {
            user_id: Harness::user(),
            provider,
            lookup: SubscriptionLookup::Current,
        }
    }

    fn by_id(id: &str) -> GetProviderSubscriptionQuery {
        GetProviderSubscriptionQuery {
            user_id: Harness::user(),
            provider: Provider::Asaas,
            lookup: SubscriptionLookup::ProviderId(id.to_string()),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Current subscription
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn no_subscription_is_empty_not_an_error() {
        let h = Harness::new();

        let view = handler(&h).handle(current(Provider::Stripe)).await.unwrap();

        assert!(view.subscription.is_none());
        assert!(view.stripe_details().is_none());
    }

    #[tokio::test]
    async fn subscription_on_the_other_provider_is_not_shown() {
        let h = Harness::new();
        h.subscribe(Provider::Asaas, &h.pro).await;

        let view = handler(&h).handle(current(Provider::Stripe)).await.unwrap();

        assert!(view.subscription.is_none());
        assert!(!h.asaas.was_called("get_subscription"));
    }

    #[tokio::test]
    async fn stripe_current_includes_provider_details() {
        let h = Harness::new();
        let stripe_id = h.subscribe_stripe_paid(&h.pro).await;

        let view = handler(&h).handle(current(Provider::Stripe)).await.unwrap();

        assert_eq!(view.subscription.as_ref().unwrap().status, SubscriptionStatus::Active);
        assert_eq!(view.stripe_details().map(|d| d.id), Some(stripe_id));
        assert_eq!(h.store.subscriptions()[0].status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn asaas_current_lists_synced_payments() {
        let h = Harness::new();
        h.subscribe(Provider::Asaas, &h.pro).await;

        let view = handler(&h).handle(current(Provider::Asaas)).await.unwrap();

        assert_eq!(view.subscription.as_ref().unwrap().status, SubscriptionStatus::Pending);
        assert_eq!(view.payments().len(), 1);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // By provider id
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn asaas_by_id_persists_provider_status() {
        let h = Harness::new();
        let created = h.subscribe(Provider::Asaas, &h.pro).await;
        let asaas_id = created.subscription.provider_subscription_id().unwrap().to_string();
        h.asaas.set_subscription_status(&asaas_id, asaas_status::EXPIRED);

        let view = handler(&h).handle(by_id(&asaas_id)).await.unwrap();

        assert_eq!(view.subscription.unwrap().status, SubscriptionStatus::Cancelled);
        assert_eq!(h.store.subscriptions()[0].status, SubscriptionStatus::Cancelled);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let h = Harness::new();
        h.subscribe(Provider::Asaas, &h.pro).await;

        let result = handler(&h).handle(by_id("sub_someone_else")).await;

        assert!(matches!(result, Err(BillingError::NotFound { .. })));
    }

    #[tokio::test]
    async fn another_users_subscription_is_not_found() {
        let h = Harness::new();
        let created = h.subscribe(Provider::Asaas, &h.pro).await;
        let asaas_id = created.subscription.provider_subscription_id().unwrap().to_string();

        let result = handler(&h)
            .handle(GetProviderSubscriptionQuery {
                user_id: UserId::new("user-2").unwrap(),
                ..by_id(&asaas_id)
            })
            .await;

        assert!(matches!(result, Err(BillingError::NotFound { .. })));
    }

    #[tokio::test]
    async fn provider_outage_fails_the_request() {
        let h = Harness::new();
        let created = h.subscribe(Provider::Asaas, &h.pro).await;
        let asaas_id = created.subscription.provider_subscription_id().unwrap().to_string();
        h.asaas
            .set_method_error("get_subscription", GatewayError::network("connection reset"));

        let result = handler(&h).handle(by_id(&asaas_id)).await;

        assert!(matches!(result, Err(BillingError::Provider { .. })));
    }

    #[tokio::test]
    async fn locally_cancelled_is_shown_without_provider_call() {
        let h = Harness::new();
        let created = h.subscribe(Provider::Asaas, &h.pro).await;
        let asaas_id = created.subscription.provider_subscription_id().unwrap().to_string();
        let mut sub = h.store.subscriptions()[0].clone();
        sub.cancel().unwrap();
        SubscriptionRepository::update(h.store.as_ref(), &sub, None)
            .await
            .unwrap();

        let view = handler(&h).handle(by_id(&asaas_id)).await.unwrap();

        assert!(view.subscription.unwrap().is_hard_cancelled());
        assert!(!h.asaas.was_called("get_subscription"));
    }
}
