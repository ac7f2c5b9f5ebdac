//! Property tests for the one-live-subscription-per-user rule.
//!
//! Random sequences of lifecycle commands, and bursts of concurrent
//! subscribes, must never leave a user holding two PENDING/ACTIVE rows.

use std::sync::Arc;

use futures::future::join_all;
use proptest::prelude::*;

use jobboard_billing::adapters::asaas::MockAsaasGateway;
use jobboard_billing::adapters::memory::{
    InMemoryBillingStore, InMemoryCustomerRepository, InMemoryPlanRepository,
    InMemoryUserDirectory,
};
use jobboard_billing::adapters::stripe::MockStripeGateway;
use jobboard_billing::application::handlers::billing::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, ChangePlanCommand, ChangePlanHandler,
    CreateSubscriptionCommand, CreateSubscriptionHandler,
};
use jobboard_billing::application::{AsaasBilling, BillingProviders, StripeBilling, UserLocks};
use jobboard_billing::domain::billing::{BillingInterval, Plan, Provider};
use jobboard_billing::domain::foundation::{Money, UserId};
use jobboard_billing::ports::{ReturnUrls, UserProfile};

#[derive(Debug, Clone)]
enum Op {
    Subscribe { provider: Provider, pro: bool },
    Cancel,
    ChangePlan { pro: bool },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any::<bool>(), any::<bool>()).prop_map(|(stripe, pro)| Op::Subscribe {
            provider: if stripe { Provider::Stripe } else { Provider::Asaas },
            pro,
        }),
        Just(Op::Cancel),
        any::<bool>().prop_map(|pro| Op::ChangePlan { pro }),
    ]
}

struct World {
    store: Arc<InMemoryBillingStore>,
    create: CreateSubscriptionHandler,
    cancel: CancelSubscriptionHandler,
    change: ChangePlanHandler,
    basic: Plan,
    pro: Plan,
}

fn plan(name: &str, cents: i64) -> Plan {
    Plan::new(
        name,
        None,
        vec![],
        Money::from_cents(cents).unwrap(),
        BillingInterval::Month,
        Some(format!("price_{}", name.to_lowercase())),
    )
    .unwrap()
}

fn user() -> UserId {
    UserId::new("user-1").unwrap()
}

fn world() -> World {
    let basic = plan("Basic", 2990);
    let pro = plan("Pro", 4990);

    let store = Arc::new(InMemoryBillingStore::new());
    let plans = Arc::new(InMemoryPlanRepository::with_plans(vec![basic.clone(), pro.clone()]));
    let customers = Arc::new(InMemoryCustomerRepository::new());
    let users = Arc::new(InMemoryUserDirectory::new());
    users.add(UserProfile {
        id: user(),
        auth_subject: "auth-1".to_string(),
        name: "Ana Souza".to_string(),
        email: "ana@example.com".to_string(),
        phone: None,
        tax_id: Some("12345678909".to_string()),
    });

    let stripe = Arc::new(MockStripeGateway::new());
    let asaas = Arc::new(MockAsaasGateway::new());
    let providers = BillingProviders::new(
        Arc::new(StripeBilling::new(stripe, customers.clone())),
        Arc::new(AsaasBilling::new(asaas, customers.clone(), store.clone())),
    );
    let locks = Arc::new(UserLocks::new());

    World {
        create: CreateSubscriptionHandler::new(
            plans.clone(),
            store.clone(),
            customers,
            users,
            providers.clone(),
            locks.clone(),
        ),
        cancel: CancelSubscriptionHandler::new(store.clone(), providers.clone(), locks.clone()),
        change: ChangePlanHandler::new(plans, store.clone(), providers, locks),
        store,
        basic,
        pro,
    }
}

fn subscribe_command(w: &World, provider: Provider, pro: bool) -> CreateSubscriptionCommand {
    CreateSubscriptionCommand {
        user_id: user(),
        plan_id: if pro { w.pro.id } else { w.basic.id },
        provider,
        return_urls: (provider == Provider::Stripe).then(|| ReturnUrls {
            success_url: "https://jobs.example/billing/success".to_string(),
            cancel_url: "https://jobs.example/billing".to_string(),
        }),
    }
}

fn live_count(store: &InMemoryBillingStore) -> usize {
    store
        .subscriptions()
        .iter()
        .filter(|s| s.status.holds_slot())
        .count()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn never_more_than_one_live_subscription(ops in prop::collection::vec(op(), 1..12)) {
        let w = world();
        runtime().block_on(async {
            for op in ops {
                // Rejections are expected; only the slot rule matters here.
                let _ = match op {
                    Op::Subscribe { provider, pro } => {
                        w.create.handle(subscribe_command(&w, provider, pro)).await.map(|_| ())
                    }
                    Op::Cancel => w
                        .cancel
                        .handle(CancelSubscriptionCommand { user_id: user() })
                        .await
                        .map(|_| ()),
                    Op::ChangePlan { pro } => w
                        .change
                        .handle(ChangePlanCommand {
                            user_id: user(),
                            plan_id: if pro { w.pro.id } else { w.basic.id },
                        })
                        .await
                        .map(|_| ()),
                };
                assert!(live_count(&w.store) <= 1);
            }
        });
    }
}

#[tokio::test]
async fn concurrent_subscribes_share_one_slot() {
    let w = world();

    let attempts = (0..8).map(|i| {
        let provider = if i % 2 == 0 { Provider::Asaas } else { Provider::Stripe };
        w.create.handle(subscribe_command(&w, provider, i % 3 == 0))
    });
    join_all(attempts).await;

    assert_eq!(live_count(&w.store), 1);
}
