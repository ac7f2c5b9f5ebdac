//! Shared state for the billing routers.

use std::sync::Arc;

use crate::application::handlers::billing::{
    CancelSubscriptionHandler, ChangePlanHandler, CreateSubscriptionHandler,
    GetBillingSummaryHandler, GetPaymentHandler, GetPaymentStatusHandler,
    GetProviderSubscriptionHandler,
    HandleAsaasWebhookHandler, HandleStripeWebhookHandler, ListInvoicesHandler,
    ReactivateSubscriptionHandler,
};
use crate::application::handlers::plans::{CreatePlanHandler, ListPlansHandler, UpdatePlanHandler};
use crate::application::{BillingProviders, UserLocks};
use crate::domain::billing::{AsaasWebhookAuthenticator, Provider, StripeWebhookVerifier};
use crate::ports::{
    AsaasGateway, CustomerRepository, PaymentRepository, PlanRepository, StripeGateway,
    SubscriptionRepository, UserDirectory, WebhookEventRepository,
};

/// Application state containing every dependency the routes need.
///
/// Cloned per request; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct BillingAppState {
    pub plans: Arc<dyn PlanRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub customers: Arc<dyn CustomerRepository>,
    pub users: Arc<dyn UserDirectory>,
    pub webhook_events: Arc<dyn WebhookEventRepository>,
    pub stripe: Arc<dyn StripeGateway>,
    pub asaas: Arc<dyn AsaasGateway>,
    pub providers: BillingProviders,
    pub locks: Arc<UserLocks>,
    pub stripe_webhooks: StripeWebhookVerifier,
    pub asaas_webhooks: AsaasWebhookAuthenticator,
}

impl BillingAppState {
    // === Subscription lifecycle ===

    pub fn create_subscription_handler(&self) -> CreateSubscriptionHandler {
        CreateSubscriptionHandler::new(
            self.plans.clone(),
            self.subscriptions.clone(),
            self.customers.clone(),
            self.users.clone(),
            self.providers.clone(),
            self.locks.clone(),
        )
    }

    pub fn cancel_subscription_handler(&self) -> CancelSubscriptionHandler {
        CancelSubscriptionHandler::new(
            self.subscriptions.clone(),
            self.providers.clone(),
            self.locks.clone(),
        )
    }

    pub fn reactivate_subscription_handler(&self) -> ReactivateSubscriptionHandler {
        ReactivateSubscriptionHandler::new(
            self.subscriptions.clone(),
            self.providers.clone(),
            self.locks.clone(),
        )
    }

    pub fn change_plan_handler(&self) -> ChangePlanHandler {
        ChangePlanHandler::new(
            self.plans.clone(),
            self.subscriptions.clone(),
            self.providers.clone(),
            self.locks.clone(),
        )
    }

    // === Reads ===

    pub fn billing_summary_handler(&self) -> GetBillingSummaryHandler {
        GetBillingSummaryHandler::new(
            self.plans.clone(),
            self.subscriptions.clone(),
            self.providers.clone(),
            self.locks.clone(),
        )
    }

    pub fn payment_status_handler(&self) -> GetPaymentStatusHandler {
        GetPaymentStatusHandler::new(
            self.subscriptions.clone(),
            self.payments.clone(),
            self.providers.clone(),
            self.locks.clone(),
        )
    }

    pub fn provider_subscription_handler(&self) -> GetProviderSubscriptionHandler {
        GetProviderSubscriptionHandler::new(
            self.subscriptions.clone(),
            self.providers.clone(),
            self.locks.clone(),
        )
    }

    pub fn payment_handler(&self) -> GetPaymentHandler {
        GetPaymentHandler::new(self.payments.clone(), self.asaas.clone())
    }

    pub fn invoices_handler(&self) -> ListInvoicesHandler {
        ListInvoicesHandler::new(self.customers.clone(), self.stripe.clone())
    }

    // === Webhooks ===

    pub fn stripe_webhook_handler(&self) -> HandleStripeWebhookHandler {
        HandleStripeWebhookHandler::new(
            self.stripe_webhooks.clone(),
            self.subscriptions.clone(),
            self.webhook_events.clone(),
            self.providers.get(Provider::Stripe),
            self.locks.clone(),
        )
    }

    pub fn asaas_webhook_handler(&self) -> HandleAsaasWebhookHandler {
        HandleAsaasWebhookHandler::new(
            self.asaas_webhooks.clone(),
            self.subscriptions.clone(),
            self.payments.clone(),
            self.webhook_events.clone(),
            self.providers.get(Provider::Asaas),
            self.locks.clone(),
        )
    }

    // === Plan catalog ===

    pub fn list_plans_handler(&self) -> ListPlansHandler {
        ListPlansHandler::new(self.plans.clone())
    }

    pub fn create_plan_handler(&self) -> CreatePlanHandler {
        CreatePlanHandler::new(self.plans.clone(), self.stripe.clone())
    }

    pub fn update_plan_handler(&self) -> UpdatePlanHandler {
        UpdatePlanHandler::new(self.plans.clone(), self.stripe.clone())
    }
}
