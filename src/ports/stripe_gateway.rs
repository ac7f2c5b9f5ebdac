//! Stripe gateway port.
//!
//! The subset of the Stripe API the billing flows need. Adapters translate
//! these calls to form-encoded requests; tests use in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::billing::BillingInterval;
use crate::domain::foundation::{Money, Timestamp, UserId};

use super::GatewayError;

/// Request to create a Stripe customer.
#[derive(Debug, Clone)]
pub struct CreateStripeCustomer {
    pub user_id: UserId,
    pub email: String,
    pub name: String,
}

/// Request to open a hosted checkout for one recurring price.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub customer_id: String,
    pub price_id: String,
    pub user_id: UserId,
    pub success_url: String,
    pub cancel_url: String,
}

/// A Stripe checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,

    /// Hosted page URL. Absent once the session is complete or expired.
    pub url: Option<String>,

    /// `open`, `complete` or `expired`.
    pub status: Option<String>,

    /// Set once the customer finished paying.
    pub subscription_id: Option<String>,
}

/// What we read back from a Stripe subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StripeSubscriptionInfo {
    pub id: String,
    pub status: String,
    pub customer_id: String,
    pub current_period_end: Option<Timestamp>,
    pub cancel_at_period_end: bool,

    /// First subscription item; plan changes replace its price.
    pub item_id: Option<String>,
    pub price_id: Option<String>,
}

/// An invoice as shown on the billing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StripeInvoice {
    pub id: String,
    pub number: Option<String>,
    pub status: Option<String>,
    pub amount_due: i64,
    pub amount_paid: i64,
    pub currency: String,
    pub created: Option<Timestamp>,
    pub hosted_invoice_url: Option<String>,
    pub invoice_pdf: Option<String>,
    pub subscription_id: Option<String>,
}

/// Request to create a recurring price with an inline product.
#[derive(Debug, Clone)]
pub struct CreatePriceRequest {
    pub product_name: String,
    pub unit_amount: Money,
    pub currency: String,
    pub interval: BillingInterval,
    pub metadata: HashMap<String, String>,
}

impl CreatePriceRequest {
    /// Price for a catalog plan. The currency is left to the gateway default.
    pub fn for_plan(
        name: &str,
        description: Option<&str>,
        features: &[String],
        price: Money,
        interval: BillingInterval,
    ) -> Self {
        let mut metadata = HashMap::new();
        if let Some(description) = description {
            metadata.insert("description".to_string(), description.to_string());
        }
        if !features.is_empty() {
            metadata.insert("features".to_string(), features.join(", "));
        }
        Self {
            product_name: name.to_string(),
            unit_amount: price,
            currency: String::new(),
            interval,
            metadata,
        }
    }
}

/// Port for the Stripe API.
#[async_trait]
pub trait StripeGateway: Send + Sync {
    /// Create a customer. Returns the Stripe customer id.
    async fn create_customer(&self, request: CreateStripeCustomer) -> Result<String, GatewayError>;

    /// Open a subscription-mode checkout session.
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, GatewayError>;

    async fn retrieve_checkout_session(&self, session_id: &str)
        -> Result<CheckoutSession, GatewayError>;

    /// Expire an open checkout session so it can no longer be paid.
    async fn expire_checkout_session(&self, session_id: &str) -> Result<(), GatewayError>;

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscriptionInfo, GatewayError>;

    /// Swap the subscription item's price, invoicing the proration immediately.
    async fn update_subscription_price(
        &self,
        subscription_id: &str,
        item_id: &str,
        price_id: &str,
    ) -> Result<StripeSubscriptionInfo, GatewayError>;

    async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel_at_period_end: bool,
    ) -> Result<StripeSubscriptionInfo, GatewayError>;

    /// Cancel immediately.
    async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscriptionInfo, GatewayError>;

    /// Most recent invoices first.
    async fn list_invoices(
        &self,
        customer_id: &str,
        limit: u32,
    ) -> Result<Vec<StripeInvoice>, GatewayError>;

    /// Create a recurring price. Returns the price id.
    async fn create_price(&self, request: CreatePriceRequest) -> Result<String, GatewayError>;
}
