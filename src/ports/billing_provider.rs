//! Billing provider capability port.
//!
//! One implementation per payment provider. The lifecycle handlers only talk
//! to this trait, so create, cancel, change-plan and reactivate read the
//! same for Stripe and Asaas.
//!
//! Implementations perform the provider calls and apply the result to the
//! aggregate they are given. Persisting is left to the caller, which writes
//! the subscription and any new payment in one transaction.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::billing::{BillingError, Payment, Plan, Provider, Subscription};
use crate::domain::foundation::UserId;

use super::{AsaasSubscriptionInfo, CheckoutSession, StripeInvoice, StripeSubscriptionInfo, UserProfile};

/// Where Stripe sends the customer after checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnUrls {
    pub success_url: String,
    pub cancel_url: String,
}

/// Input for starting a provider subscription.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub user_id: UserId,
    pub plan: Plan,
    pub customer_id: String,
    pub return_urls: Option<ReturnUrls>,
}

/// A subscription just started (or still awaiting payment) at a provider.
///
/// For Stripe the payable part is `subscription.checkout_url`; for Asaas
/// it is the first payment and its PIX charge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub subscription: Subscription,
    pub first_payment: Option<Payment>,
}

/// What the provider said when asked for current state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "provider", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderSnapshot {
    Stripe(StripeSnapshot),
    Asaas(AsaasSnapshot),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StripeSnapshot {
    /// Absent while the checkout has not completed.
    pub subscription: Option<StripeSubscriptionInfo>,
    pub checkout: Option<CheckoutSession>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AsaasSnapshot {
    pub subscription: AsaasSubscriptionInfo,

    /// Local payments after syncing with the provider, earliest due first.
    /// Pending PIX charges carry a freshly fetched QR code.
    pub payments: Vec<Payment>,
}

impl ProviderSnapshot {
    /// The payment with the latest due date (Asaas only).
    pub fn latest_payment(&self) -> Option<&Payment> {
        match self {
            ProviderSnapshot::Stripe(_) => None,
            ProviderSnapshot::Asaas(snapshot) => snapshot
                .payments
                .iter()
                .max_by(|a, b| a.due_date.cmp(&b.due_date).then(a.created_at.cmp(&b.created_at))),
        }
    }
}

/// Provider-specific data shown on the billing page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "provider", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingDetails {
    Stripe(StripeBillingDetails),
    Asaas(AsaasBillingDetails),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StripeBillingDetails {
    pub subscription: Option<StripeSubscriptionInfo>,
    pub invoices: Vec<StripeInvoice>,
    pub can_update_payment_method: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AsaasBillingDetails {
    pub subscription: AsaasSubscriptionInfo,

    /// Latest due first.
    pub payments: Vec<Payment>,
    pub last_payment_with_qr_code: Option<Payment>,
    pub can_update_payment_method: bool,
}

/// Uniform contract over the two payment providers.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    fn provider(&self) -> Provider;

    /// Local checks that must pass before any provider call.
    fn validate_request(
        &self,
        plan: &Plan,
        return_urls: Option<&ReturnUrls>,
    ) -> Result<(), BillingError>;

    /// Create the provider customer for a user. Returns its id.
    async fn create_customer(&self, user: &UserProfile) -> Result<String, BillingError>;

    /// Start a subscription at the provider and build the local aggregate.
    ///
    /// Nothing is persisted. If a later step fails the caller must call
    /// [`BillingProvider::discard`] on the returned subscription.
    async fn create_subscription(&self, request: NewSubscription)
        -> Result<Enrollment, BillingError>;

    /// Undo a subscription started by `create_subscription` that could not
    /// be stored. Best effort.
    async fn discard(&self, subscription: &Subscription) -> Result<(), BillingError>;

    /// Payload for a pending subscription so a repeated subscribe returns it
    /// instead of starting a second one.
    async fn pending_checkout(&self, subscription: &Subscription)
        -> Result<Enrollment, BillingError>;

    /// Cancel immediately at the provider and mark the aggregate cancelled.
    async fn cancel(&self, subscription: &mut Subscription) -> Result<(), BillingError>;

    /// Move to another plan. Returns the new first payment when the
    /// provider had to start a new subscription.
    async fn change_plan(
        &self,
        subscription: &mut Subscription,
        plan: &Plan,
    ) -> Result<Option<Payment>, BillingError>;

    /// Undo a soft cancel. Returns a payment to settle when the provider
    /// needed a new subscription.
    async fn reactivate(&self, subscription: &mut Subscription)
        -> Result<Option<Payment>, BillingError>;

    /// Pull the provider's current state and apply it to the aggregate.
    async fn refresh_status(
        &self,
        subscription: &mut Subscription,
    ) -> Result<ProviderSnapshot, BillingError>;

    /// Build the billing page details from a fresh snapshot.
    async fn billing_details(
        &self,
        subscription: &Subscription,
        snapshot: ProviderSnapshot,
    ) -> Result<BillingDetails, BillingError>;
}
