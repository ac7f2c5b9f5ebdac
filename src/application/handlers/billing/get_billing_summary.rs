//! GetBillingSummaryHandler - the billing page.
//!
//! Shows the user's latest subscription after pulling fresh state from its
//! provider. A provider outage degrades the page to the stored state rather
//! than failing it.

use std::sync::Arc;

use futures::future::try_join;
use serde::Serialize;
use tracing::warn;

use crate::application::providers::BillingProviders;
use crate::application::user_locks::UserLocks;
use crate::domain::billing::{BillingError, Plan, Provider, Subscription, SubscriptionStatus};
use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::{
    BillingDetails, BillingProvider, PlanRepository, ProviderSnapshot, SubscriptionRepository,
};

#[derive(Debug, Clone)]
pub struct GetBillingSummaryQuery {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SummaryStatus {
    NoSubscription,
    Pending,
    Active,
    Cancelled,
}

impl From<SubscriptionStatus> for SummaryStatus {
    fn from(status: SubscriptionStatus) -> Self {
        match status {
            SubscriptionStatus::Pending => SummaryStatus::Pending,
            SubscriptionStatus::Active => SummaryStatus::Active,
            SubscriptionStatus::Cancelled => SummaryStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingSummary {
    pub status: SummaryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Subscription>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_billing_date: Option<Timestamp>,
    pub cancel_at_period_end: bool,
    pub can_update_payment_method: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing: Option<BillingDetails>,
}

impl BillingSummary {
    fn no_subscription() -> Self {
        Self {
            status: SummaryStatus::NoSubscription,
            provider: None,
            subscription: None,
            plan: None,
            next_billing_date: None,
            cancel_at_period_end: false,
            can_update_payment_method: false,
            billing: None,
        }
    }
}

pub struct GetBillingSummaryHandler {
    plans: Arc<dyn PlanRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    providers: BillingProviders,
    locks: Arc<UserLocks>,
}

impl GetBillingSummaryHandler {
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

    pub async fn handle(&self, query: GetBillingSummaryQuery) -> Result<BillingSummary, BillingError> {
        // 1. The refresh below writes; queue behind the user's other writers
        let _guard = self.locks.acquire(&query.user_id).await;

        // 2. Latest subscription, if any
        let Some(mut subscription) = self
            .subscriptions
            .find_latest_for_user(&query.user_id)
            .await?
        else {
            return Ok(BillingSummary::no_subscription());
        };

        // 3. Plan and provider state in parallel
        let billing = self.providers.get(subscription.provider);
        let plan_id = subscription.plan_id;
        let load_plan = async {
            self.plans
                .find_by_id(&plan_id)
                .await
                .map_err(BillingError::from)
        };
        let (plan, snapshot) = try_join(load_plan, refresh(billing.as_ref(), &mut subscription)).await?;

        // 4. Keep what the provider told us
        if snapshot.is_some() {
            self.subscriptions.update(&subscription, None).await?;
        }

        // 5. Provider-specific details
        let details = match snapshot {
            Some(snapshot) => match billing.billing_details(&subscription, snapshot).await {
                Ok(details) => Some(details),
                Err(err) => {
                    warn!(
                        subscription_id = %subscription.id,
                        error = %err,
                        "Billing details unavailable"
                    );
                    None
                }
            },
            None => None,
        };

        let next_billing_date = if subscription.status == SubscriptionStatus::Cancelled {
            None
        } else {
            subscription.current_period_end
        };

        Ok(BillingSummary {
            status: subscription.status.into(),
            provider: Some(subscription.provider),
            next_billing_date,
            cancel_at_period_end: subscription.cancel_at_period_end,
            can_update_payment_method: subscription.provider.can_update_payment_method(),
            plan,
            billing: details,
            subscription: Some(subscription),
        })
    }
}

/// Pulls provider state unless the subscription was cancelled outright.
/// Provider failures are logged and yield `None`.
async fn refresh(
    billing: &dyn BillingProvider,
    subscription: &mut Subscription,
) -> Result<Option<ProviderSnapshot>, BillingError> {
    if subscription.is_hard_cancelled() {
        return Ok(None);
    }
    match billing.refresh_status(subscription).await {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(err @ BillingError::Provider { .. }) => {
            warn!(
                subscription_id = %subscription.id,
                error = %err,
                "Provider refresh failed; showing stored state"
            );
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::billing::test_support::Harness;
    use crate::ports::{asaas_status, GatewayError};

    fn handler(h: &Harness) -> GetBillingSummaryHandler {
        GetBillingSummaryHandler::new(
            h.plans.clone(),
            h.store.clone(),
            h.providers.clone(),
            h.locks.clone(),
        )
    }

    fn query() -> GetBillingSummaryQuery {
        GetBillingSummaryQuery {
            user_id: Harness::user(),
        }
    }

    #[tokio::test]
    async fn user_without_subscription() {
        let h = Harness::new();

        let summary = handler(&h).handle(query()).await.unwrap();

        assert_eq!(summary.status, SummaryStatus::NoSubscription);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["status"], "NO_SUBSCRIPTION");
        assert!(json.get("subscription").is_none());
    }

    #[tokio::test]
    async fn stripe_summary_confirms_paid_checkout() {
        let h = Harness::new();
        h.subscribe_stripe_paid(&h.pro).await;

        let summary = handler(&h).handle(query()).await.unwrap();

        assert_eq!(summary.status, SummaryStatus::Active);
        assert!(summary.can_update_payment_method);
        assert!(summary.next_billing_date.is_some());
        assert_eq!(summary.plan.as_ref().map(|p| p.id), Some(h.pro.id));
        assert!(matches!(summary.billing, Some(BillingDetails::Stripe(_))));
        assert_eq!(h.store.subscriptions()[0].status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn asaas_summary_exposes_pending_qr_code() {
        let h = Harness::new();
        h.subscribe(Provider::Asaas, &h.pro).await;

        let summary = handler(&h).handle(query()).await.unwrap();

        assert_eq!(summary.status, SummaryStatus::Pending);
        assert!(!summary.can_update_payment_method);
        let Some(BillingDetails::Asaas(details)) = summary.billing else {
            panic!("expected Asaas details");
        };
        assert!(details.last_payment_with_qr_code.is_some());
        assert_eq!(details.payments.len(), 1);
    }

    #[tokio::test]
    async fn expired_at_provider_shows_cancelled() {
        let h = Harness::new();
        let created = h.subscribe(Provider::Asaas, &h.pro).await;
        h.asaas.set_subscription_status(
            created.subscription.provider_subscription_id().unwrap(),
            asaas_status::EXPIRED,
        );

        let summary = handler(&h).handle(query()).await.unwrap();

        assert_eq!(summary.status, SummaryStatus::Cancelled);
        assert!(summary.next_billing_date.is_none());
        assert_eq!(h.store.subscriptions()[0].status, SubscriptionStatus::Cancelled);
    }

    #[tokio::test]
    async fn provider_outage_falls_back_to_stored_state() {
        let h = Harness::new();
        h.subscribe(Provider::Asaas, &h.pro).await;
        h.asaas
            .set_method_error("get_subscription", GatewayError::network("connection reset"));

        let summary = handler(&h).handle(query()).await.unwrap();

        assert_eq!(summary.status, SummaryStatus::Pending);
        assert!(summary.billing.is_none());
        assert!(summary.subscription.is_some());
    }

    #[tokio::test]
    async fn refresh_waits_for_a_running_cancel() {
        let h = Harness::new();
        h.subscribe(Provider::Asaas, &h.pro).await;
        let summary_handler = handler(&h);
        let guard = h.locks.acquire(&Harness::user()).await;

        // Stands in for a cancel holding the user's lock when the page loads.
        let cancel = async {
            tokio::task::yield_now().await;
            let mut sub = h.store.subscriptions()[0].clone();
            sub.cancel().unwrap();
            SubscriptionRepository::update(h.store.as_ref(), &sub, None)
                .await
                .unwrap();
            drop(guard);
        };
        let (summary, ()) = tokio::join!(summary_handler.handle(query()), cancel);

        assert_eq!(summary.unwrap().status, SummaryStatus::Cancelled);
        assert!(h.store.subscriptions()[0].is_hard_cancelled());
    }

    #[tokio::test]
    async fn card_recovered_after_lapse_shows_active() {
        let h = Harness::new();
        let stripe_id = h.subscribe_stripe_paid(&h.pro).await;
        handler(&h).handle(query()).await.unwrap();
        h.stripe.set_subscription_status(&stripe_id, "past_due");
        assert_eq!(
            handler(&h).handle(query()).await.unwrap().status,
            SummaryStatus::Cancelled
        );

        h.stripe.set_subscription_status(&stripe_id, "active");
        let summary = handler(&h).handle(query()).await.unwrap();

        assert_eq!(summary.status, SummaryStatus::Active);
        assert_eq!(h.store.subscriptions()[0].status, SubscriptionStatus::Active);
    }
}
