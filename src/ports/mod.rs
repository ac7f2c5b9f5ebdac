//! Ports - the seams between billing logic and the outside world.
//!
//! - Gateways: [`StripeGateway`], [`AsaasGateway`] (provider HTTP APIs)
//! - Capability: [`BillingProvider`] (one per provider, used by handlers)
//! - Persistence: subscription, payment, plan, customer and webhook ledgers
//! - Identity: [`SessionValidator`], [`UserDirectory`]

mod asaas_gateway;
mod billing_provider;
mod customer_repository;
mod gateway_error;
mod payment_repository;
mod plan_repository;
mod session_validator;
mod stripe_gateway;
mod subscription_repository;
mod user_directory;
mod webhook_event_repository;

pub use asaas_gateway::{
    asaas_status, AsaasGateway, AsaasPaymentInfo, AsaasSubscriptionInfo, CreateAsaasCustomer,
    CreateAsaasSubscription,
};
pub use billing_provider::{
    AsaasBillingDetails, AsaasSnapshot, BillingDetails, BillingProvider, Enrollment,
    NewSubscription, ProviderSnapshot, ReturnUrls, StripeBillingDetails, StripeSnapshot,
};
pub use customer_repository::CustomerRepository;
pub use gateway_error::{GatewayError, GatewayErrorCode};
pub use payment_repository::PaymentRepository;
pub use plan_repository::PlanRepository;
pub use session_validator::SessionValidator;
pub use stripe_gateway::{
    CheckoutSession, CheckoutSessionRequest, CreatePriceRequest, CreateStripeCustomer,
    StripeGateway, StripeInvoice, StripeSubscriptionInfo,
};
pub use subscription_repository::SubscriptionRepository;
pub use user_directory::{UserDirectory, UserProfile};
pub use webhook_event_repository::{
    WebhookEventRecord, WebhookEventRepository, WebhookOutcome, WebhookResult,
};
