//! Billing domain - subscriptions kept in step with two payment providers.
//!
//! The canonical [`Subscription`] mirrors either a Stripe card subscription
//! or an Asaas PIX subscription. Stripe pushes state through signed
//! webhooks; Asaas state is reconciled from payment webhooks and polling.

mod asaas_event;
mod customer;
mod errors;
mod payment;
mod plan;
mod provider;
mod reconcile;
mod status;
mod stripe_event;
mod subscription;
mod webhook_errors;
mod webhook_verifier;

pub use asaas_event::{AsaasEventType, AsaasPaymentPayload, AsaasWebhookEvent};
pub use customer::CustomerLink;
pub use errors::BillingError;
pub use payment::{first_payment, BillingType, Payment, PaymentStatus, PixCharge};
pub use plan::{BillingInterval, Plan};
pub use provider::Provider;
pub use reconcile::asaas_canonical_status;
pub use status::SubscriptionStatus;
pub use stripe_event::{
    stripe_status_to_canonical, CheckoutSessionObject, StripeEvent, StripeEventData,
    StripeEventType, SubscriptionObject,
};
pub use subscription::{ProviderRef, ProviderSubscription, Subscription};
pub use webhook_errors::WebhookError;
pub use webhook_verifier::{
    AsaasWebhookAuthenticator, SignatureHeader, StripeWebhookVerifier, ASAAS_TOKEN_HEADER,
};

#[cfg(test)]
pub use webhook_verifier::compute_test_signature;
