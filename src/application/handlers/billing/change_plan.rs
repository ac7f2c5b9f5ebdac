//! ChangePlanHandler - moves the current subscription to another plan.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::application::providers::BillingProviders;
use crate::application::user_locks::UserLocks;
use crate::domain::billing::{BillingError, Payment, Subscription};
use crate::domain::foundation::{PlanId, UserId};
use crate::ports::{PlanRepository, SubscriptionRepository};

#[derive(Debug, Clone)]
pub struct ChangePlanCommand {
    pub user_id: UserId,
    pub plan_id: PlanId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePlanResult {
    pub subscription: Subscription,

    /// First charge of the replacement Asaas subscription.
    pub payment: Option<Payment>,
}

/// Handler for plan changes.
///
/// Stripe swaps the price in place with proration. Asaas cannot change a
/// subscription, so a new one is opened and the old one deleted.
pub struct ChangePlanHandler {
    plans: Arc<dyn PlanRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    providers: BillingProviders,
    locks: Arc<UserLocks>,
}

impl ChangePlanHandler {
    pub fn new(
        plans: Arc<dyn PlanRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        providers: BillingProviders,
        locks: Arc<UserLocks>,
    ) -> Self {
        Self {
            plans,
            subscriptions,
            providers,
            locks,
        }
    }

    pub async fn handle(&self, cmd: ChangePlanCommand) -> Result<ChangePlanResult, BillingError> {
        // 1. Serialize with other lifecycle commands
        let _guard = self.locks.acquire(&cmd.user_id).await;

        // 2. Current subscription
        let mut subscription = self
            .subscriptions
            .find_current_for_user(&cmd.user_id)
            .await?
            .ok_or_else(BillingError::subscription_not_found)?;

        // 3. Target plan
        let plan = self
            .plans
            .find_by_id(&cmd.plan_id)
            .await?
            .filter(|plan| plan.active)
            .ok_or_else(BillingError::plan_not_found)?;

        if subscription.plan_id == plan.id {
            return Err(BillingError::validation("planId", "Subscription is already on this plan"));
        }

        // 4. Provider side
        let previous_plan = subscription.plan_id;
        let billing = self.providers.get(subscription.provider);
        let payment = billing.change_plan(&mut subscription, &plan).await?;

        // 5. Persist; the provider change cannot be rolled back from here
        if let Err(err) = self.subscriptions.update(&subscription, payment.as_ref()).await {
            error!(
                subscription_id = %subscription.id,
                provider = %subscription.provider,
                provider_reference = %subscription.provider_subscription.reference.external_id(),
                plan_id = %plan.id,
                error = %err,
                "Plan changed at provider but not stored"
            );
            return Err(err.into());
        }

        info!(
            subscription_id = %subscription.id,
            provider = %subscription.provider,
            from_plan = %previous_plan,
            to_plan = %plan.id,
            "Subscription plan changed"
        );

        Ok(ChangePlanResult {
            subscription,
            payment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::billing::test_support::Harness;
    use crate::domain::billing::{Provider, SubscriptionStatus};
    use crate::domain::foundation::Money;

    fn handler(h: &Harness) -> ChangePlanHandler {
        ChangePlanHandler::new(h.plans.clone(), h.store.clone(), h.providers.clone(), h.locks.clone())
    }

    async fn activate_stripe(h: &Harness) {
        h.subscribe_stripe_paid(&h.basic).await;
        let mut sub = h.store.subscriptions()[0].clone();
        h.providers
            .get(Provider::Stripe)
            .refresh_status(&mut sub)
            .await
            .unwrap();
        SubscriptionRepository::update(h.store.as_ref(), &sub, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn without_subscription_is_not_found() {
        let h = Harness::new();

        let result = handler(&h)
            .handle(ChangePlanCommand {
                user_id: Harness::user(),
                plan_id: h.pro.id,
            })
            .await;

        assert!(matches!(result, Err(BillingError::NotFound { .. })));
    }

    #[tokio::test]
    async fn same_plan_is_rejected() {
        let h = Harness::new();
        h.subscribe(Provider::Asaas, &h.pro).await;

        let result = handler(&h)
            .handle(ChangePlanCommand {
                user_id: Harness::user(),
                plan_id: h.pro.id,
            })
            .await;

        assert!(matches!(result, Err(BillingError::ValidationFailed { .. })));
        assert_eq!(h.asaas.call_count("create_subscription"), 1);
    }

    #[tokio::test]
    async fn stripe_change_swaps_price_and_keeps_status() {
        let h = Harness::new();
        activate_stripe(&h).await;

        let result = handler(&h)
            .handle(ChangePlanCommand {
                user_id: Harness::user(),
                plan_id: h.pro.id,
            })
            .await
            .unwrap();

        assert_eq!(result.subscription.plan_id, h.pro.id);
        assert_eq!(result.subscription.price_amount, Money::from_cents(4990).unwrap());
        assert_eq!(result.subscription.status, SubscriptionStatus::Active);
        assert!(result.payment.is_none());
        assert!(h.stripe.was_called("update_subscription_price"));
    }

    #[tokio::test]
    async fn asaas_change_stores_new_first_payment() {
        let h = Harness::new();
        let created = h.subscribe(Provider::Asaas, &h.basic).await;
        let old_reference = created.subscription.provider_subscription_id().unwrap().to_string();

        let result = handler(&h)
            .handle(ChangePlanCommand {
                user_id: Harness::user(),
                plan_id: h.pro.id,
            })
            .await
            .unwrap();

        let payment = result.payment.expect("new first payment");
        assert_ne!(payment.provider_subscription_id, old_reference);
        assert_eq!(payment.value, Money::from_cents(4990).unwrap());
        assert!(h.asaas.subscription(&old_reference).unwrap().deleted);
        assert_eq!(h.store.payments().len(), 2);
        assert_eq!(h.store.subscriptions()[0].plan_id, h.pro.id);
    }
}
