//! Billing API server.
//!
//! Reads `JOBBOARD__*` configuration, connects to PostgreSQL, applies
//! migrations and serves the billing routes.

use std::sync::Arc;

use axum::Router;
use http::{HeaderValue, Method};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use jobboard_billing::adapters::asaas::AsaasClient;
use jobboard_billing::adapters::auth::{SupabaseConfig, SupabaseSessionValidator};
use jobboard_billing::adapters::http::{api_router, AuthState, BillingAppState};
use jobboard_billing::adapters::postgres::{
    PostgresCustomerRepository, PostgresPaymentRepository, PostgresPlanRepository,
    PostgresSubscriptionRepository, PostgresUserDirectory, PostgresWebhookEventRepository,
};
use jobboard_billing::adapters::stripe::{StripeClient, StripeClientConfig};
use jobboard_billing::application::{AsaasBilling, BillingProviders, StripeBilling, UserLocks};
use jobboard_billing::config::AppConfig;
use jobboard_billing::domain::billing::{AsaasWebhookAuthenticator, StripeWebhookVerifier};
use jobboard_billing::ports::{
    AsaasGateway, CustomerRepository, PaymentRepository, PlanRepository, StripeGateway,
    SubscriptionRepository, UserDirectory, WebhookEventRepository,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    config.validate()?;

    init_tracing(&config);
    tracing::info!(
        environment = ?config.server.environment,
        stripe_test_mode = config.stripe.is_test_mode(),
        asaas_environment = ?config.asaas.environment,
        "Configuration loaded"
    );

    // Database
    let pool = config
        .database
        .pool_options()
        .connect(&config.database.url)
        .await?;
    tracing::info!("Database connection established");

    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations completed");
    }

    let state = build_state(&config, pool);
    let auth: AuthState = Arc::new(SupabaseSessionValidator::new(
        SupabaseConfig::new(
            config.auth.supabase_jwt_secret.clone(),
            config.auth.audience.clone(),
        ),
        state.users.clone(),
    ));

    let app = with_layers(api_router(state, auth), &config)?;

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Billing API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    if config.is_production() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_state(config: &AppConfig, pool: PgPool) -> BillingAppState {
    let plans: Arc<dyn PlanRepository> = Arc::new(PostgresPlanRepository::new(pool.clone()));
    let subscriptions: Arc<dyn SubscriptionRepository> =
        Arc::new(PostgresSubscriptionRepository::new(pool.clone()));
    let payments: Arc<dyn PaymentRepository> =
        Arc::new(PostgresPaymentRepository::new(pool.clone()));
    let customers: Arc<dyn CustomerRepository> =
        Arc::new(PostgresCustomerRepository::new(pool.clone()));
    let users: Arc<dyn UserDirectory> = Arc::new(PostgresUserDirectory::new(pool.clone()));
    let webhook_events: Arc<dyn WebhookEventRepository> =
        Arc::new(PostgresWebhookEventRepository::new(pool));

    let mut stripe_config = StripeClientConfig::new(config.stripe.secret_key.clone())
        .with_currency(config.stripe.currency.clone());
    if let Some(url) = &config.stripe.api_base_url {
        stripe_config = stripe_config.with_base_url(url.clone());
    }
    let stripe: Arc<dyn StripeGateway> = Arc::new(StripeClient::new(stripe_config));
    let asaas: Arc<dyn AsaasGateway> = Arc::new(AsaasClient::new(
        config.asaas.api_key.clone(),
        config.asaas.base_url(),
    ));

    let providers = BillingProviders::new(
        Arc::new(StripeBilling::new(stripe.clone(), customers.clone())),
        Arc::new(
            AsaasBilling::new(asaas.clone(), customers.clone(), payments.clone())
                .with_fallback_tax_id(config.asaas.fallback_tax_id.clone()),
        ),
    );

    let asaas_webhooks = AsaasWebhookAuthenticator::new(config.asaas.webhook_token());
    if !asaas_webhooks.is_enforced() {
        tracing::warn!(
            "JOBBOARD__ASAAS__WEBHOOK_TOKEN is not set; Asaas webhooks are accepted unauthenticated"
        );
    }

    BillingAppState {
        plans,
        subscriptions,
        payments,
        customers,
        users,
        webhook_events,
        stripe,
        asaas,
        providers,
        locks: Arc::new(UserLocks::new()),
        stripe_webhooks: StripeWebhookVerifier::new(
            config.stripe.webhook_secret.expose_secret().clone(),
        ),
        asaas_webhooks,
    }
}

fn with_layers(app: Router, config: &AppConfig) -> Result<Router, BoxError> {
    let origins = config
        .server
        .cors_origins_list()
        .iter()
        .map(|origin| HeaderValue::from_str(origin))
        .collect::<Result<Vec<_>, _>>()?;
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);

    Ok(app.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TimeoutLayer::new(config.server.request_timeout()))
            .layer(cors),
    ))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
