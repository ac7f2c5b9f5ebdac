//! Stripe implementation of the billing capability.
//!
//! A Stripe subscription does not exist until the customer finishes the
//! hosted checkout, so a new subscription starts with the checkout session
//! id as a placeholder reference. The checkout webhook (or a status poll)
//! swaps it for the real subscription id.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::billing::{
    stripe_status_to_canonical, BillingError, Payment, Plan, Provider, ProviderRef, Subscription,
};
use crate::ports::{
    BillingDetails, BillingProvider, CheckoutSessionRequest, CreateStripeCustomer,
    CustomerRepository, Enrollment, NewSubscription, ProviderSnapshot, ReturnUrls,
    StripeBillingDetails, StripeGateway, StripeSnapshot, StripeSubscriptionInfo, UserProfile,
};

use super::mirror_status;

/// Invoices shown on the billing page.
pub const INVOICE_PAGE_SIZE: u32 = 24;

const SESSION_OPEN: &str = "open";
const SESSION_EXPIRED: &str = "expired";

pub struct StripeBilling {
    gateway: Arc<dyn StripeGateway>,
    customers: Arc<dyn CustomerRepository>,
}

impl StripeBilling {
    pub fn new(gateway: Arc<dyn StripeGateway>, customers: Arc<dyn CustomerRepository>) -> Self {
        Self { gateway, customers }
    }

    fn provider_error(err: crate::ports::GatewayError) -> BillingError {
        err.into_billing(Provider::Stripe)
    }

    fn confirmed_id(subscription: &Subscription) -> Result<&str, BillingError> {
        subscription.provider_subscription_id().ok_or_else(|| {
            BillingError::conflict("Checkout has not been completed for this subscription")
        })
    }

    fn mirror(
        subscription: &mut Subscription,
        info: &StripeSubscriptionInfo,
    ) -> Result<(), BillingError> {
        mirror_status(
            subscription,
            stripe_status_to_canonical(&info.status),
            Some(info.status.clone()),
            info.current_period_end,
            Some(info.cancel_at_period_end),
        )
    }
}

#[async_trait]
impl BillingProvider for StripeBilling {
    fn provider(&self) -> Provider {
        Provider::Stripe
    }

    fn validate_request(
        &self,
        plan: &Plan,
        return_urls: Option<&ReturnUrls>,
    ) -> Result<(), BillingError> {
        plan.require_stripe_price()?;
        match return_urls {
            Some(urls) if !urls.success_url.trim().is_empty() && !urls.cancel_url.trim().is_empty() => {
                Ok(())
            }
            _ => Err(BillingError::validation(
                "successUrl",
                "successUrl and cancelUrl are required for card checkout",
            )),
        }
    }

    async fn create_customer(&self, user: &UserProfile) -> Result<String, BillingError> {
        self.gateway
            .create_customer(CreateStripeCustomer {
                user_id: user.id.clone(),
                email: user.email.clone(),
                name: user.name.clone(),
            })
            .await
            .map_err(Self::provider_error)
    }

    async fn create_subscription(
        &self,
        request: NewSubscription,
    ) -> Result<Enrollment, BillingError> {
        self.validate_request(&request.plan, request.return_urls.as_ref())?;
        let price_id = request.plan.require_stripe_price()?.to_string();
        let urls = request.return_urls.ok_or_else(|| {
            BillingError::validation("successUrl", "successUrl and cancelUrl are required")
        })?;

        let session = self
            .gateway
            .create_checkout_session(CheckoutSessionRequest {
                customer_id: request.customer_id,
                price_id,
                user_id: request.user_id.clone(),
                success_url: urls.success_url,
                cancel_url: urls.cancel_url,
            })
            .await
            .map_err(Self::provider_error)?;

        let url = session.url.clone().ok_or_else(|| {
            BillingError::provider(Provider::Stripe, "checkout session returned without a url")
        })?;

        info!(
            user_id = %request.user_id,
            plan_id = %request.plan.id,
            session_id = %session.id,
            "Stripe checkout session created"
        );

        Ok(Enrollment {
            subscription: Subscription::start_stripe_checkout(
                request.user_id,
                &request.plan,
                session.id,
                url,
            ),
            first_payment: None,
        })
    }

    async fn discard(&self, subscription: &Subscription) -> Result<(), BillingError> {
        match &subscription.provider_subscription.reference {
            ProviderRef::Pending { placeholder } => self
                .gateway
                .expire_checkout_session(placeholder)
                .await
                .map_err(Self::provider_error),
            ProviderRef::Confirmed { id } => self
                .gateway
                .cancel_subscription(id)
                .await
                .map(|_| ())
                .map_err(Self::provider_error),
        }
    }

    async fn pending_checkout(
        &self,
        subscription: &Subscription,
    ) -> Result<Enrollment, BillingError> {
        let mut pending = subscription.clone();
        if pending.checkout_url.is_none() {
            let ProviderRef::Pending { placeholder } = &subscription.provider_subscription.reference
            else {
                return Err(BillingError::conflict("Subscription has no open checkout"));
            };
            let session = self
                .gateway
                .retrieve_checkout_session(placeholder)
                .await
                .map_err(Self::provider_error)?;
            pending.checkout_url = Some(
                session
                    .url
                    .ok_or_else(|| BillingError::conflict("Checkout session is no longer open"))?,
            );
        }
        Ok(Enrollment {
            subscription: pending,
            first_payment: None,
        })
    }

    async fn cancel(&self, subscription: &mut Subscription) -> Result<(), BillingError> {
        match subscription.provider_subscription.reference.clone() {
            ProviderRef::Confirmed { id } => {
                self.gateway
                    .cancel_subscription(&id)
                    .await
                    .map_err(Self::provider_error)?;
            }
            ProviderRef::Pending { placeholder } => {
                // The customer may have paid since we last looked.
                let session = self
                    .gateway
                    .retrieve_checkout_session(&placeholder)
                    .await
                    .map_err(Self::provider_error)?;
                if let Some(id) = &session.subscription_id {
                    self.gateway
                        .cancel_subscription(id)
                        .await
                        .map_err(Self::provider_error)?;
                } else if session.status.as_deref() == Some(SESSION_OPEN) {
                    self.gateway
                        .expire_checkout_session(&placeholder)
                        .await
                        .map_err(Self::provider_error)?;
                }
            }
        }

        subscription.cancel()?;
        info!(subscription_id = %subscription.id, "Stripe subscription cancelled");
        Ok(())
    }

    async fn change_plan(
        &self,
        subscription: &mut Subscription,
        plan: &Plan,
    ) -> Result<Option<Payment>, BillingError> {
        let price_id = plan.require_stripe_price()?;
        let id = Self::confirmed_id(subscription)?.to_string();

        let current = self
            .gateway
            .retrieve_subscription(&id)
            .await
            .map_err(Self::provider_error)?;
        let item_id = current.item_id.ok_or_else(|| {
            BillingError::provider(Provider::Stripe, format!("subscription {} has no items", id))
        })?;

        let updated = self
            .gateway
            .update_subscription_price(&id, &item_id, price_id)
            .await
            .map_err(Self::provider_error)?;

        subscription.switch_plan(plan);
        Self::mirror(subscription, &updated)?;
        info!(
            subscription_id = %subscription.id,
            plan_id = %plan.id,
            "Stripe subscription moved to new price"
        );
        Ok(None)
    }

    async fn reactivate(
        &self,
        subscription: &mut Subscription,
    ) -> Result<Option<Payment>, BillingError> {
        if !subscription.is_soft_cancelled() {
            return Err(BillingError::subscription_not_found());
        }
        let id = Self::confirmed_id(subscription)?.to_string();

        let info = self
            .gateway
            .set_cancel_at_period_end(&id, false)
            .await
            .map_err(Self::provider_error)?;

        subscription.resume()?;
        if info.current_period_end.is_some() {
            subscription.set_period_end(info.current_period_end);
        }
        info!(subscription_id = %subscription.id, "Stripe subscription reactivated");
        Ok(None)
    }

    async fn refresh_status(
        &self,
        subscription: &mut Subscription,
    ) -> Result<ProviderSnapshot, BillingError> {
        match subscription.provider_subscription.reference.clone() {
            ProviderRef::Confirmed { id } => {
                let info = self
                    .gateway
                    .retrieve_subscription(&id)
                    .await
                    .map_err(Self::provider_error)?;
                Self::mirror(subscription, &info)?;
                Ok(ProviderSnapshot::Stripe(StripeSnapshot {
                    subscription: Some(info),
                    checkout: None,
                }))
            }
            ProviderRef::Pending { placeholder } => {
                let session = self
                    .gateway
                    .retrieve_checkout_session(&placeholder)
                    .await
                    .map_err(Self::provider_error)?;

                let mut info = None;
                if let Some(id) = &session.subscription_id {
                    let fetched = self
                        .gateway
                        .retrieve_subscription(id)
                        .await
                        .map_err(Self::provider_error)?;
                    if subscription.is_hard_cancelled() {
                        warn!(
                            subscription_id = %subscription.id,
                            stripe_subscription_id = %id,
                            "Checkout completed for a subscription cancelled locally"
                        );
                    } else {
                        subscription.confirm_checkout(
                            id.clone(),
                            fetched.current_period_end,
                            fetched.cancel_at_period_end,
                        )?;
                        Self::mirror(subscription, &fetched)?;
                        info!(
                            subscription_id = %subscription.id,
                            stripe_subscription_id = %id,
                            "Stripe checkout confirmed by status poll"
                        );
                    }
                    info = Some(fetched);
                } else if session.status.as_deref() == Some(SESSION_EXPIRED)
                    && subscription.status.holds_slot()
                {
                    subscription.cancel()?;
                    info!(
                        subscription_id = %subscription.id,
                        "Stripe checkout expired; pending subscription cancelled"
                    );
                }

                Ok(ProviderSnapshot::Stripe(StripeSnapshot {
                    subscription: info,
                    checkout: Some(session),
                }))
            }
        }
    }

    async fn billing_details(
        &self,
        subscription: &Subscription,
        snapshot: ProviderSnapshot,
    ) -> Result<BillingDetails, BillingError> {
        let ProviderSnapshot::Stripe(snapshot) = snapshot else {
            return Err(BillingError::inconsistency(format!(
                "subscription {} got a non-Stripe snapshot",
                subscription.id
            )));
        };

        let customer = self
            .customers
            .find(&subscription.user_id, Provider::Stripe)
            .await?
            .ok_or_else(|| BillingError::not_found("customer", "Stripe customer not found"))?;

        let invoices = self
            .gateway
            .list_invoices(&customer.provider_customer_id, INVOICE_PAGE_SIZE)
            .await
            .map_err(Self::provider_error)?;

        Ok(BillingDetails::Stripe(StripeBillingDetails {
            subscription: snapshot.subscription,
            invoices,
            can_update_payment_method: Provider::Stripe.can_update_payment_method(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryCustomerRepository;
    use crate::adapters::stripe::MockStripeGateway;
    use crate::domain::billing::{BillingInterval, CustomerLink, SubscriptionStatus};
    use crate::domain::foundation::{Money, UserId};
    use crate::ports::GatewayError;

    fn plan(price_id: Option<&str>) -> Plan {
        Plan::new(
            "Pro",
            None,
            vec![],
            Money::from_cents(4990).unwrap(),
            BillingInterval::Month,
            price_id.map(str::to_string),
        )
        .unwrap()
    }

    fn urls() -> ReturnUrls {
        ReturnUrls {
            success_url: "https://jobs.example/billing/success".to_string(),
            cancel_url: "https://jobs.example/billing".to_string(),
        }
    }

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn setup() -> (StripeBilling, Arc<MockStripeGateway>, Arc<InMemoryCustomerRepository>) {
        let gateway = Arc::new(MockStripeGateway::new());
        let customers = Arc::new(InMemoryCustomerRepository::new());
        let billing = StripeBilling::new(gateway.clone(), customers.clone());
        (billing, gateway, customers)
    }

    async fn start(billing: &StripeBilling) -> Subscription {
        billing
            .create_subscription(NewSubscription {
                user_id: user(),
                plan: plan(Some("price_pro")),
                customer_id: "cus_1".to_string(),
                return_urls: Some(urls()),
            })
            .await
            .unwrap()
            .subscription
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Validation
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn plan_without_stripe_price_is_rejected_locally() {
        let (billing, gateway, _) = setup();

        let result = billing.validate_request(&plan(None), Some(&urls()));

        assert!(matches!(result, Err(BillingError::ValidationFailed { .. })));
        assert!(gateway.calls().is_empty());
    }

    #[test]
    fn return_urls_are_required() {
        let (billing, _, _) = setup();

        let result = billing.validate_request(&plan(Some("price_pro")), None);

        assert!(matches!(result, Err(BillingError::ValidationFailed { .. })));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Lifecycle
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn create_opens_checkout_with_placeholder() {
        let (billing, gateway, _) = setup();

        let sub = start(&billing).await;

        assert_eq!(sub.status, SubscriptionStatus::Pending);
        assert!(!sub.provider_subscription.reference.is_confirmed());
        assert!(sub.checkout_url.as_deref().unwrap().starts_with("https://"));
        assert!(gateway.was_called("create_checkout_session"));
    }

    #[tokio::test]
    async fn cancel_pending_checkout_expires_session() {
        let (billing, gateway, _) = setup();
        let mut sub = start(&billing).await;

        billing.cancel(&mut sub).await.unwrap();

        assert!(sub.is_hard_cancelled());
        assert!(gateway.was_called("expire_checkout_session"));
        assert!(!gateway.was_called("cancel_subscription"));
    }

    #[tokio::test]
    async fn cancel_pending_checkout_that_was_paid_cancels_subscription() {
        let (billing, gateway, _) = setup();
        let mut sub = start(&billing).await;
        let session_id = sub.provider_subscription.reference.external_id().to_string();
        gateway.complete_checkout(&session_id, "sub_live", "cus_1");

        billing.cancel(&mut sub).await.unwrap();

        assert!(gateway.was_called("cancel_subscription"));
        assert_eq!(gateway.subscription("sub_live").unwrap().status, "canceled");
    }

    #[tokio::test]
    async fn refresh_confirms_completed_checkout() {
        let (billing, gateway, _) = setup();
        let mut sub = start(&billing).await;
        let session_id = sub.provider_subscription.reference.external_id().to_string();
        gateway.complete_checkout(&session_id, "sub_live", "cus_1");

        let snapshot = billing.refresh_status(&mut sub).await.unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.provider_subscription_id(), Some("sub_live"));
        assert!(sub.checkout_url.is_none());
        assert!(matches!(snapshot, ProviderSnapshot::Stripe(StripeSnapshot { subscription: Some(_), .. })));
    }

    #[tokio::test]
    async fn refresh_cancels_expired_checkout() {
        let (billing, gateway, _) = setup();
        let mut sub = start(&billing).await;
        let session_id = sub.provider_subscription.reference.external_id().to_string();
        gateway.expire_session(&session_id);

        billing.refresh_status(&mut sub).await.unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Cancelled);
    }

    #[tokio::test]
    async fn change_plan_swaps_price_in_place() {
        let (billing, gateway, _) = setup();
        let mut sub = start(&billing).await;
        let session_id = sub.provider_subscription.reference.external_id().to_string();
        gateway.complete_checkout(&session_id, "sub_live", "cus_1");
        billing.refresh_status(&mut sub).await.unwrap();
        let bigger = plan(Some("price_business"));

        let payment = billing.change_plan(&mut sub, &bigger).await.unwrap();

        assert!(payment.is_none());
        assert_eq!(sub.plan_id, bigger.id);
        assert_eq!(sub.provider_subscription_id(), Some("sub_live"));
        assert_eq!(
            gateway.subscription("sub_live").unwrap().price_id.as_deref(),
            Some("price_business")
        );
    }

    #[tokio::test]
    async fn change_plan_before_checkout_completes_is_a_conflict() {
        let (billing, _, _) = setup();
        let mut sub = start(&billing).await;

        let result = billing.change_plan(&mut sub, &plan(Some("price_business"))).await;

        assert!(matches!(result, Err(BillingError::Conflict(_))));
    }

    #[tokio::test]
    async fn reactivate_clears_cancel_at_period_end() {
        let (billing, gateway, _) = setup();
        let mut sub = start(&billing).await;
        let session_id = sub.provider_subscription.reference.external_id().to_string();
        gateway.complete_checkout(&session_id, "sub_live", "cus_1");
        billing.refresh_status(&mut sub).await.unwrap();
        sub.apply_provider_status(SubscriptionStatus::Cancelled, None, None, Some(true))
            .unwrap();

        billing.reactivate(&mut sub).await.unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert!(!sub.cancel_at_period_end);
        assert!(!gateway.subscription("sub_live").unwrap().cancel_at_period_end);
    }

    #[tokio::test]
    async fn provider_failure_is_reported_generically() {
        let (billing, gateway, _) = setup();
        gateway.set_method_error(
            "create_checkout_session",
            GatewayError::provider("No such price: 'price_pro'"),
        );

        let result = billing
            .create_subscription(NewSubscription {
                user_id: user(),
                plan: plan(Some("price_pro")),
                customer_id: "cus_1".to_string(),
                return_urls: Some(urls()),
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.message(), "Payment provider request failed");
        assert!(err.detail().contains("No such price"));
    }

    #[tokio::test]
    async fn billing_details_lists_invoices() {
        let (billing, gateway, customers) = setup();
        customers
            .insert(&CustomerLink::new(user(), Provider::Stripe, "cus_1"))
            .await
            .unwrap();
        gateway.add_invoice("cus_1", "in_1");
        let mut sub = start(&billing).await;
        let snapshot = billing.refresh_status(&mut sub).await.unwrap();

        let details = billing.billing_details(&sub, snapshot).await.unwrap();

        let BillingDetails::Stripe(details) = details else {
            panic!("expected Stripe details");
        };
        assert_eq!(details.invoices.len(), 1);
        assert!(details.can_update_payment_method);
    }
}
