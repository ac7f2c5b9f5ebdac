//! CreateSubscriptionHandler - starts a subscription with either provider.
//!
//! A user holds at most one live (PENDING or ACTIVE) subscription. Asking
//! again while a checkout is pending returns that checkout instead of
//! opening a second one; asking with the other provider supersedes it.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::application::providers::BillingProviders;
use crate::application::user_locks::UserLocks;
use crate::domain::billing::{BillingError, Payment, Provider, Subscription, SubscriptionStatus};
use crate::domain::foundation::{PlanId, UserId};
use crate::ports::{
    CustomerRepository, Enrollment, NewSubscription, PlanRepository, ReturnUrls,
    SubscriptionRepository, UserDirectory,
};

use super::customers::ensure_customer;

/// Command to subscribe a user to a plan.
#[derive(Debug, Clone)]
pub struct CreateSubscriptionCommand {
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub provider: Provider,
    /// Required for Stripe checkout.
    pub return_urls: Option<ReturnUrls>,
}

/// What the client needs to finish paying.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionResult {
    pub provider: Provider,
    pub subscription: Subscription,

    /// Stripe hosted checkout page.
    pub checkout_url: Option<String>,

    /// Asaas first charge with its PIX QR code.
    pub payment: Option<Payment>,

    /// True when an already pending subscription was returned.
    pub resumed: bool,
}

impl CreateSubscriptionResult {
    fn from_enrollment(enrollment: Enrollment, resumed: bool) -> Self {
        Self {
            provider: enrollment.subscription.provider,
            checkout_url: enrollment.subscription.checkout_url.clone(),
            subscription: enrollment.subscription,
            payment: enrollment.first_payment,
            resumed,
        }
    }
}

/// Handler for starting subscriptions.
pub struct CreateSubscriptionHandler {
    plans: Arc<dyn PlanRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    customers: Arc<dyn CustomerRepository>,
    users: Arc<dyn UserDirectory>,
    providers: BillingProviders,
    locks: Arc<UserLocks>,
}

impl CreateSubscriptionHandler {
    pub fn new(
        plans: Arc<dyn PlanRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        customers: Arc<dyn CustomerRepository>,
        users: Arc<dyn UserDirectory>,
        providers: BillingProviders,
        locks: Arc<UserLocks>,
    ) -> Self {
        Self {
            plans,
            subscriptions,
            customers,
            users,
            providers,
            locks,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateSubscriptionCommand,
    ) -> Result<CreateSubscriptionResult, BillingError> {
        // 1. One lifecycle command per user at a time
        let _guard = self.locks.acquire(&cmd.user_id).await;

        // 2. Load the plan; inactive plans cannot be bought
        let plan = self
            .plans
            .find_by_id(&cmd.plan_id)
            .await?
            .filter(|plan| plan.active)
            .ok_or_else(BillingError::plan_not_found)?;

        // 3. Local validation before any provider call
        let billing = self.providers.get(cmd.provider);
        billing.validate_request(&plan, cmd.return_urls.as_ref())?;

        // 4. Resolve whatever occupies the slot
        if let Some(existing) = self.subscriptions.find_current_for_user(&cmd.user_id).await? {
            if let Some(resumed) = self.resolve_existing(existing, cmd.provider).await? {
                return Ok(resumed);
            }
        }

        // 5. Provider customer
        let customer_id = ensure_customer(
            self.customers.as_ref(),
            self.users.as_ref(),
            billing.as_ref(),
            &cmd.user_id,
        )
        .await?;

        // 6. Start at the provider
        let enrollment = billing
            .create_subscription(NewSubscription {
                user_id: cmd.user_id.clone(),
                plan: plan.clone(),
                customer_id,
                return_urls: cmd.return_urls,
            })
            .await?;

        // 7. Persist subscription and first payment together, undoing the
        //    provider side if that fails
        if let Err(err) = self
            .subscriptions
            .insert(&enrollment.subscription, enrollment.first_payment.as_ref())
            .await
        {
            warn!(
                user_id = %cmd.user_id,
                provider = %cmd.provider,
                error = %err,
                "Could not store new subscription; discarding it at the provider"
            );
            if let Err(discard_err) = billing.discard(&enrollment.subscription).await {
                error!(
                    user_id = %cmd.user_id,
                    provider = %cmd.provider,
                    provider_reference = %enrollment.subscription.provider_subscription.reference.external_id(),
                    error = %discard_err,
                    "Failed to discard provider subscription"
                );
            }
            return Err(err.into());
        }

        info!(
            user_id = %cmd.user_id,
            subscription_id = %enrollment.subscription.id,
            plan_id = %plan.id,
            provider = %cmd.provider,
            "Subscription created"
        );

        Ok(CreateSubscriptionResult::from_enrollment(enrollment, false))
    }

    /// Returns the pending checkout to hand back, or `None` when the slot is
    /// free for a new subscription.
    async fn resolve_existing(
        &self,
        mut existing: Subscription,
        requested: Provider,
    ) -> Result<Option<CreateSubscriptionResult>, BillingError> {
        match (existing.status, existing.provider == requested) {
            (SubscriptionStatus::Active, _) => Err(BillingError::already_subscribed()),

            (SubscriptionStatus::Pending, true) => {
                // The provider may have settled or expired it meanwhile.
                let billing = self.providers.get(requested);
                billing.refresh_status(&mut existing).await?;
                self.subscriptions.update(&existing, None).await?;

                match existing.status {
                    SubscriptionStatus::Pending => {
                        let enrollment = billing.pending_checkout(&existing).await?;
                        info!(
                            user_id = %existing.user_id,
                            subscription_id = %existing.id,
                            provider = %requested,
                            "Returning pending checkout"
                        );
                        Ok(Some(CreateSubscriptionResult::from_enrollment(enrollment, true)))
                    }
                    SubscriptionStatus::Active => Err(BillingError::already_subscribed()),
                    SubscriptionStatus::Cancelled => Ok(None),
                }
            }

            (SubscriptionStatus::Pending, false) => {
                let other = self.providers.get(existing.provider);
                other.cancel(&mut existing).await?;
                self.subscriptions.update(&existing, None).await?;
                info!(
                    user_id = %existing.user_id,
                    subscription_id = %existing.id,
                    from = %existing.provider,
                    to = %requested,
                    "Pending subscription superseded by another provider"
                );
                Ok(None)
            }

            (SubscriptionStatus::Cancelled, _) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::billing::test_support::{plan, Harness};
    use crate::domain::billing::{Plan, PaymentStatus};
    use crate::domain::foundation::{DomainError, SubscriptionId};
    use crate::ports::{asaas_status, PlanRepository};
    use async_trait::async_trait;

    fn command(h: &Harness, provider: Provider) -> CreateSubscriptionCommand {
        CreateSubscriptionCommand {
            user_id: Harness::user(),
            plan_id: h.pro.id,
            provider,
            return_urls: (provider == Provider::Stripe).then(Harness::urls),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Mock Implementations
    // ════════════════════════════════════════════════════════════════════════════

    /// Accepts reads but refuses every write, like a database that lost the
    /// unique-index race.
    struct RejectingSubscriptionRepository;

    #[async_trait]
    impl SubscriptionRepository for RejectingSubscriptionRepository {
        async fn insert(
            &self,
            _subscription: &Subscription,
            _first_payment: Option<&Payment>,
        ) -> Result<(), DomainError> {
            Err(DomainError::database("duplicate key value violates unique constraint"))
        }

        async fn update(
            &self,
            _subscription: &Subscription,
            _new_payment: Option<&Payment>,
        ) -> Result<(), DomainError> {
            Err(DomainError::database("read only"))
        }

        async fn find_by_id(&self, _id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
            Ok(None)
        }

        async fn find_current_for_user(
            &self,
            _user_id: &UserId,
        ) -> Result<Option<Subscription>, DomainError> {
            Ok(None)
        }

        async fn find_latest_for_user(
            &self,
            _user_id: &UserId,
        ) -> Result<Option<Subscription>, DomainError> {
            Ok(None)
        }

        async fn find_reactivatable_for_user(
            &self,
            _user_id: &UserId,
        ) -> Result<Option<Subscription>, DomainError> {
            Ok(None)
        }

        async fn find_by_provider_reference(
            &self,
            _provider: Provider,
            _external_id: &str,
        ) -> Result<Option<Subscription>, DomainError> {
            Ok(None)
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // New subscriptions
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn stripe_subscription_starts_pending_with_checkout_url() {
        let h = Harness::new();

        let result = h.subscribe(Provider::Stripe, &h.pro).await;

        assert_eq!(result.subscription.status, SubscriptionStatus::Pending);
        assert!(result.checkout_url.is_some());
        assert!(result.payment.is_none());
        assert!(!result.resumed);
        assert_eq!(h.store.subscriptions().len(), 1);
    }

    #[tokio::test]
    async fn asaas_subscription_stores_first_pix_payment() {
        let h = Harness::new();

        let result = h.subscribe(Provider::Asaas, &h.pro).await;

        let payment = result.payment.expect("first payment");
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(payment.pix.is_some());
        assert_eq!(h.store.payments().len(), 1);
        assert_eq!(h.asaas.last_customer_tax_id().as_deref(), Some("12345678909"));
    }

    #[tokio::test]
    async fn inactive_plan_is_not_found() {
        let h = Harness::new();
        let mut retired = plan("Legacy", 1990, Some("price_legacy"));
        retired.active = false;
        h.plans.insert(&retired).await.unwrap();

        let result = h
            .create_handler()
            .handle(CreateSubscriptionCommand {
                plan_id: retired.id,
                ..command(&h, Provider::Asaas)
            })
            .await;

        assert!(matches!(result, Err(BillingError::NotFound { .. })));
        assert!(!h.asaas.was_called("create_subscription"));
    }

    #[tokio::test]
    async fn stripe_requires_a_price_before_calling_the_provider() {
        let h = Harness::new();
        let asaas_only: Plan = plan("PIX only", 1990, None);
        h.plans.insert(&asaas_only).await.unwrap();

        let result = h
            .create_handler()
            .handle(CreateSubscriptionCommand {
                plan_id: asaas_only.id,
                ..command(&h, Provider::Stripe)
            })
            .await;

        assert!(matches!(result, Err(BillingError::ValidationFailed { .. })));
        assert!(h.stripe.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_insert_discards_the_provider_subscription() {
        let h = Harness::new();
        let handler = CreateSubscriptionHandler::new(
            h.plans.clone(),
            Arc::new(RejectingSubscriptionRepository),
            h.customers.clone(),
            h.users.clone(),
            h.providers.clone(),
            h.locks.clone(),
        );

        let result = handler.handle(command(&h, Provider::Asaas)).await;

        assert!(matches!(result, Err(BillingError::Infrastructure(_))));
        assert!(h.asaas.was_called("delete_subscription"));
        assert!(h.asaas.live_subscriptions().is_empty());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Existing subscriptions
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn active_subscription_blocks_a_new_one() {
        let h = Harness::new();
        h.subscribe_stripe_paid(&h.pro).await;
        // Pull the paid checkout into local state.
        let mut confirmed = h.store.subscriptions()[0].clone();
        h.providers
            .get(Provider::Stripe)
            .refresh_status(&mut confirmed)
            .await
            .unwrap();
        SubscriptionRepository::update(h.store.as_ref(), &confirmed, None)
            .await
            .unwrap();

        let result = h.create_handler().handle(command(&h, Provider::Asaas)).await;

        assert!(matches!(result, Err(BillingError::Conflict(_))));
        assert!(!h.asaas.was_called("create_subscription"));
    }

    #[tokio::test]
    async fn repeated_asaas_request_returns_pending_charge() {
        let h = Harness::new();
        let first = h.subscribe(Provider::Asaas, &h.pro).await;

        let second = h.subscribe(Provider::Asaas, &h.pro).await;

        assert!(second.resumed);
        assert_eq!(second.subscription.id, first.subscription.id);
        assert!(second.payment.is_some());
        assert_eq!(h.asaas.call_count("create_subscription"), 1);
    }

    #[tokio::test]
    async fn repeated_stripe_request_returns_same_checkout() {
        let h = Harness::new();
        let first = h.subscribe(Provider::Stripe, &h.pro).await;

        let second = h.subscribe(Provider::Stripe, &h.pro).await;

        assert!(second.resumed);
        assert_eq!(second.checkout_url, first.checkout_url);
        assert_eq!(h.stripe.call_count("create_checkout_session"), 1);
    }

    #[tokio::test]
    async fn pending_checkout_paid_meanwhile_reports_already_subscribed() {
        let h = Harness::new();
        h.subscribe_stripe_paid(&h.pro).await;

        let result = h.create_handler().handle(command(&h, Provider::Stripe)).await;

        assert!(matches!(result, Err(BillingError::Conflict(_))));
        assert_eq!(h.store.subscriptions()[0].status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn expired_pending_subscription_is_replaced() {
        let h = Harness::new();
        let first = h.subscribe(Provider::Asaas, &h.pro).await;
        let asaas_id = first.subscription.provider_subscription_id().unwrap().to_string();
        h.asaas.set_subscription_status(&asaas_id, asaas_status::EXPIRED);

        let second = h.subscribe(Provider::Asaas, &h.pro).await;

        assert!(!second.resumed);
        assert_ne!(second.subscription.id, first.subscription.id);
        let stored = h.store.subscriptions();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].status, SubscriptionStatus::Cancelled);
    }

    #[tokio::test]
    async fn switching_provider_cancels_pending_checkout() {
        let h = Harness::new();
        let stripe = h.subscribe(Provider::Stripe, &h.pro).await;
        let session_id = stripe
            .subscription
            .provider_subscription
            .reference
            .external_id()
            .to_string();

        let asaas = h.subscribe(Provider::Asaas, &h.pro).await;

        assert_eq!(asaas.provider, Provider::Asaas);
        assert_eq!(
            h.stripe.session(&session_id).unwrap().status.as_deref(),
            Some("expired")
        );
        let stored = h.store.subscriptions();
        assert_eq!(stored[0].status, SubscriptionStatus::Cancelled);
        assert_eq!(stored[1].status, SubscriptionStatus::Pending);
    }

    #[tokio::test]
    async fn asaas_without_tax_id_fails_before_opening_anything() {
        let h = Harness::new();
        h.users.add(crate::ports::UserProfile {
            tax_id: None,
            ..Harness::profile()
        });

        let result = h.create_handler().handle(command(&h, Provider::Asaas)).await;

        assert!(matches!(
            result,
            Err(BillingError::ValidationFailed { ref field, .. }) if field == "cpfCnpj"
        ));
        assert!(!h.asaas.was_called("create_subscription"));
        assert!(h.store.subscriptions().is_empty());
    }
}
