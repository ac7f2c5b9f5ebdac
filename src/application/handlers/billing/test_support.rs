//! Wiring for billing handler tests: in-memory stores, both mock gateways
//! and the real provider capabilities on top of them.

use std::sync::Arc;

use crate::adapters::asaas::MockAsaasGateway;
use crate::adapters::memory::{
    InMemoryBillingStore, InMemoryCustomerRepository, InMemoryPlanRepository,
    InMemoryUserDirectory, InMemoryWebhookEventRepository,
};
use crate::adapters::stripe::MockStripeGateway;
use crate::application::providers::{AsaasBilling, BillingProviders, StripeBilling};
use crate::application::user_locks::UserLocks;
use crate::domain::billing::{BillingInterval, Plan, Provider};
use crate::domain::foundation::{Money, UserId};
use crate::ports::{ReturnUrls, UserProfile};

use super::{CreateSubscriptionCommand, CreateSubscriptionHandler, CreateSubscriptionResult};

pub(crate) struct Harness {
    pub store: Arc<InMemoryBillingStore>,
    pub plans: Arc<InMemoryPlanRepository>,
    pub customers: Arc<InMemoryCustomerRepository>,
    pub users: Arc<InMemoryUserDirectory>,
    pub webhook_events: Arc<InMemoryWebhookEventRepository>,
    pub stripe: Arc<MockStripeGateway>,
    pub asaas: Arc<MockAsaasGateway>,
    pub providers: BillingProviders,
    pub locks: Arc<UserLocks>,
    pub basic: Plan,
    pub pro: Plan,
}

impl Harness {
    pub fn new() -> Self {
        let basic = plan("Basic", 2990, Some("price_basic"));
        let pro = plan("Pro", 4990, Some("price_pro"));

        let store = Arc::new(InMemoryBillingStore::new());
        let plans = Arc::new(InMemoryPlanRepository::with_plans(vec![basic.clone(), pro.clone()]));
        let customers = Arc::new(InMemoryCustomerRepository::new());
        let users = Arc::new(InMemoryUserDirectory::new());
        users.add(Self::profile());

        let stripe = Arc::new(MockStripeGateway::new());
        let asaas = Arc::new(MockAsaasGateway::new());
        let providers = BillingProviders::new(
            Arc::new(StripeBilling::new(stripe.clone(), customers.clone())),
            Arc::new(AsaasBilling::new(asaas.clone(), customers.clone(), store.clone())),
        );

        Self {
            store,
            plans,
            customers,
            users,
            webhook_events: Arc::new(InMemoryWebhookEventRepository::new()),
            stripe,
            asaas,
            providers,
            locks: Arc::new(UserLocks::new()),
            basic,
            pro,
        }
    }

    pub fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    pub fn profile() -> UserProfile {
        UserProfile {
            id: Self::user(),
            auth_subject: "auth-1".to_string(),
            name: "Ana Souza".to_string(),
            email: "ana@example.com".to_string(),
            phone: Some("11999990000".to_string()),
            tax_id: Some("12345678909".to_string()),
        }
    }

    pub fn urls() -> ReturnUrls {
        ReturnUrls {
            success_url: "https://jobs.example/billing/success".to_string(),
            cancel_url: "https://jobs.example/billing".to_string(),
        }
    }

    pub fn create_handler(&self) -> CreateSubscriptionHandler {
        CreateSubscriptionHandler::new(
            self.plans.clone(),
            self.store.clone(),
            self.customers.clone(),
            self.users.clone(),
            self.providers.clone(),
            self.locks.clone(),
        )
    }

    /// Subscribes the test user, panicking on failure.
    pub async fn subscribe(&self, provider: Provider, plan: &Plan) -> CreateSubscriptionResult {
        let return_urls = (provider == Provider::Stripe).then(Self::urls);
        self.create_handler()
            .handle(CreateSubscriptionCommand {
                user_id: Self::user(),
                plan_id: plan.id,
                provider,
                return_urls,
            })
            .await
            .expect("subscribe")
    }

    /// Subscribes through Stripe and completes the checkout at the provider.
    /// Returns the Stripe subscription id.
    pub async fn subscribe_stripe_paid(&self, plan: &Plan) -> String {
        let created = self.subscribe(Provider::Stripe, plan).await;
        let session_id = created
            .subscription
            .provider_subscription
            .reference
            .external_id()
            .to_string();
        let customer_id = self
            .customers_id(Provider::Stripe)
            .await
            .expect("stripe customer");
        self.stripe.complete_checkout(&session_id, "sub_stripe_1", &customer_id);
        "sub_stripe_1".to_string()
    }

    pub async fn customers_id(&self, provider: Provider) -> Option<String> {
        use crate::ports::CustomerRepository;
        self.customers
            .find(&Self::user(), provider)
            .await
            .unwrap()
            .map(|link| link.provider_customer_id)
    }
}

pub(crate) fn plan(name: &str, cents: i64, stripe_price_id: Option<&str>) -> Plan {
    Plan::new(
        name,
        Some(format!("{} plan", name)),
        vec!["Job posts".to_string()],
        Money::from_cents(cents).unwrap(),
        BillingInterval::Month,
        stripe_price_id.map(str::to_string),
    )
    .unwrap()
}
