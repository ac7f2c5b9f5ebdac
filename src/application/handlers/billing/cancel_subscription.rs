//! CancelSubscriptionHandler - immediate cancellation.

use std::sync::Arc;

use tracing::{error, info};

use crate::application::providers::BillingProviders;
use crate::application::user_locks::UserLocks;
use crate::domain::billing::{BillingError, Subscription};
use crate::domain::foundation::UserId;
use crate::ports::SubscriptionRepository;

#[derive(Debug, Clone)]
pub struct CancelSubscriptionCommand {
    pub user_id: UserId,
}

/// Handler for cancelling the current subscription.
///
/// Cancels at the provider right away: a pending Stripe checkout is
/// expired, an Asaas subscription is deleted. The result is final; only
/// subscriptions cancelled at period end by the provider can be reactivated.
pub struct CancelSubscriptionHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    providers: BillingProviders,
    locks: Arc<UserLocks>,
}

impl CancelSubscriptionHandler {
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

    pub async fn handle(&self, cmd: CancelSubscriptionCommand) -> Result<Subscription, BillingError> {
        // 1. Serialize with other lifecycle commands
        let _guard = self.locks.acquire(&cmd.user_id).await;

        // 2. Find the live subscription
        let mut subscription = self
            .subscriptions
            .find_current_for_user(&cmd.user_id)
            .await?
            .ok_or_else(BillingError::subscription_not_found)?;

        // 3. Cancel at the provider
        let billing = self.providers.get(subscription.provider);
        billing.cancel(&mut subscription).await?;

        // 4. Persist
        if let Err(err) = self.subscriptions.update(&subscription, None).await {
            error!(
                subscription_id = %subscription.id,
                provider = %subscription.provider,
                error = %err,
                "Subscription cancelled at provider but not stored"
            );
            return Err(err.into());
        }

        info!(
            user_id = %cmd.user_id,
            subscription_id = %subscription.id,
            provider = %subscription.provider,
            "Subscription cancelled"
        );
        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::billing::test_support::Harness;
    use crate::domain::billing::{Provider, SubscriptionStatus};
    use crate::ports::GatewayError;

    fn handler(h: &Harness) -> CancelSubscriptionHandler {
        CancelSubscriptionHandler::new(h.store.clone(), h.providers.clone(), h.locks.clone())
    }

    fn command() -> CancelSubscriptionCommand {
        CancelSubscriptionCommand {
            user_id: Harness::user(),
        }
    }

    #[tokio::test]
    async fn nothing_to_cancel_is_not_found() {
        let h = Harness::new();

        let result = handler(&h).handle(command()).await;

        assert!(matches!(result, Err(BillingError::NotFound { .. })));
    }

    #[tokio::test]
    async fn asaas_cancel_deletes_provider_subscription() {
        let h = Harness::new();
        let created = h.subscribe(Provider::Asaas, &h.pro).await;
        let asaas_id = created.subscription.provider_subscription_id().unwrap().to_string();

        let cancelled = handler(&h).handle(command()).await.unwrap();

        assert!(cancelled.is_hard_cancelled());
        assert!(h.asaas.subscription(&asaas_id).unwrap().deleted);
        assert_eq!(h.store.subscriptions()[0].status, SubscriptionStatus::Cancelled);
    }

    #[tokio::test]
    async fn stripe_cancel_expires_open_checkout() {
        let h = Harness::new();
        h.subscribe(Provider::Stripe, &h.pro).await;

        let cancelled = handler(&h).handle(command()).await.unwrap();

        assert_eq!(cancelled.status, SubscriptionStatus::Cancelled);
        assert!(cancelled.checkout_url.is_none());
        assert!(h.stripe.was_called("expire_checkout_session"));
    }

    #[tokio::test]
    async fn provider_failure_leaves_subscription_untouched() {
        let h = Harness::new();
        h.subscribe(Provider::Asaas, &h.pro).await;
        h.asaas
            .set_method_error("delete_subscription", GatewayError::network("timeout"));

        let result = handler(&h).handle(command()).await;

        assert!(matches!(result, Err(BillingError::Provider { .. })));
        assert_eq!(h.store.subscriptions()[0].status, SubscriptionStatus::Pending);
    }

    #[tokio::test]
    async fn cancelled_subscription_frees_the_slot() {
        let h = Harness::new();
        h.subscribe(Provider::Asaas, &h.pro).await;
        handler(&h).handle(command()).await.unwrap();

        let again = h.subscribe(Provider::Asaas, &h.basic).await;

        assert!(!again.resumed);
        assert_eq!(h.store.subscriptions().len(), 2);
    }
}
