//! Stripe REST client.
//!
//! Form-encoded requests against `https://api.stripe.com/v1`, authenticated
//! with the secret key as the basic-auth user. Reads are retried on
//! transient failures; writes are sent once.

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::adapters::retry::{with_retry, RetryConfig};
use crate::domain::foundation::Timestamp;
use crate::ports::{
    CheckoutSession, CheckoutSessionRequest, CreatePriceRequest, CreateStripeCustomer,
    GatewayError, GatewayErrorCode, StripeGateway, StripeInvoice, StripeSubscriptionInfo,
};

pub const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com/v1";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeClientConfig {
    /// Secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    api_base_url: String,
    currency: String,
}

impl StripeClientConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            currency: "brl".to_string(),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into().to_lowercase();
        self
    }
}

/// Stripe gateway over HTTP.
pub struct StripeClient {
    config: StripeClientConfig,
    http_client: reqwest::Client,
    retry: RetryConfig,
}

impl StripeClient {
    pub fn new(config: StripeClientConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &str,
    ) -> Result<T, GatewayError> {
        let response = request
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| GatewayError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = error_from_response(status, &body);
            tracing::error!(
                operation,
                status = status.as_u16(),
                error = %error,
                "Stripe request failed"
            );
            return Err(error);
        }

        response.json::<T>().await.map_err(|e| {
            GatewayError::invalid_response(format!("Failed to parse Stripe response: {}", e))
        })
    }

    /// GET with retry.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        operation: &str,
    ) -> Result<T, GatewayError> {
        let url = self.url(path);
        with_retry(&self.retry, operation, || {
            self.send(self.http_client.get(&url).query(query), operation)
        })
        .await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        operation: &str,
    ) -> Result<T, GatewayError> {
        self.send(self.http_client.post(self.url(path)).form(params), operation)
            .await
    }
}

fn error_from_response(status: StatusCode, body: &str) -> GatewayError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error);
    let message = detail
        .as_ref()
        .and_then(|d| d.message.clone())
        .unwrap_or_else(|| format!("Stripe API error: {}", body));

    let error = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::authentication(message),
        StatusCode::NOT_FOUND => GatewayError::new(GatewayErrorCode::NotFound, message),
        StatusCode::TOO_MANY_REQUESTS => GatewayError::rate_limited(message),
        s if s.is_server_error() => GatewayError::new(GatewayErrorCode::ServiceUnavailable, message),
        _ => GatewayError::provider(message),
    };
    match detail.and_then(|d| d.code) {
        Some(code) => error.with_provider_code(code),
        None => error,
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Wire types
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct List<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct SessionWire {
    id: String,
    url: Option<String>,
    status: Option<String>,
    subscription: Option<String>,
}

impl From<SessionWire> for CheckoutSession {
    fn from(wire: SessionWire) -> Self {
        CheckoutSession {
            id: wire.id,
            url: wire.url,
            status: wire.status,
            subscription_id: wire.subscription,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubscriptionWire {
    id: String,
    status: String,
    customer: String,
    current_period_end: Option<i64>,
    #[serde(default)]
    cancel_at_period_end: bool,
    items: List<ItemWire>,
}

#[derive(Debug, Deserialize)]
struct ItemWire {
    id: String,
    price: ObjectId,
    /// Newer API versions report the period per item.
    current_period_end: Option<i64>,
}

impl From<SubscriptionWire> for StripeSubscriptionInfo {
    fn from(wire: SubscriptionWire) -> Self {
        let item = wire.items.data.into_iter().next();
        let period_end = wire
            .current_period_end
            .or_else(|| item.as_ref().and_then(|i| i.current_period_end))
            .and_then(Timestamp::from_unix_secs);
        StripeSubscriptionInfo {
            id: wire.id,
            status: wire.status,
            customer_id: wire.customer,
            current_period_end: period_end,
            cancel_at_period_end: wire.cancel_at_period_end,
            price_id: item.as_ref().map(|i| i.price.id.clone()),
            item_id: item.map(|i| i.id),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InvoiceWire {
    id: String,
    number: Option<String>,
    status: Option<String>,
    amount_due: i64,
    amount_paid: i64,
    currency: String,
    created: Option<i64>,
    hosted_invoice_url: Option<String>,
    invoice_pdf: Option<String>,
    subscription: Option<String>,
}

impl From<InvoiceWire> for StripeInvoice {
    fn from(wire: InvoiceWire) -> Self {
        StripeInvoice {
            id: wire.id,
            number: wire.number,
            status: wire.status,
            amount_due: wire.amount_due,
            amount_paid: wire.amount_paid,
            currency: wire.currency,
            created: wire.created.and_then(Timestamp::from_unix_secs),
            hosted_invoice_url: wire.hosted_invoice_url,
            invoice_pdf: wire.invoice_pdf,
            subscription_id: wire.subscription,
        }
    }
}

/// Form parameters for a subscription-mode checkout.
fn checkout_params(request: &CheckoutSessionRequest) -> Vec<(&'static str, String)> {
    vec![
        ("mode", "subscription".to_string()),
        ("customer", request.customer_id.clone()),
        ("payment_method_types[]", "card".to_string()),
        ("line_items[0][price]", request.price_id.clone()),
        ("line_items[0][quantity]", "1".to_string()),
        ("allow_promotion_codes", "true".to_string()),
        ("billing_address_collection", "required".to_string()),
        ("client_reference_id", request.user_id.to_string()),
        ("metadata[user_id]", request.user_id.to_string()),
        ("success_url", request.success_url.clone()),
        ("cancel_url", request.cancel_url.clone()),
    ]
}

fn price_params(request: &CreatePriceRequest, default_currency: &str) -> Vec<(String, String)> {
    let currency = if request.currency.is_empty() {
        default_currency.to_string()
    } else {
        request.currency.to_lowercase()
    };
    let mut params = vec![
        ("unit_amount".to_string(), request.unit_amount.cents().to_string()),
        ("currency".to_string(), currency),
        (
            "recurring[interval]".to_string(),
            request.interval.as_str().to_string(),
        ),
        ("product_data[name]".to_string(), request.product_name.clone()),
    ];
    let mut metadata: Vec<_> = request.metadata.iter().collect();
    metadata.sort();
    for (key, value) in metadata {
        params.push((format!("metadata[{}]", key), value.clone()));
    }
    params
}

#[async_trait]
impl StripeGateway for StripeClient {
    async fn create_customer(&self, request: CreateStripeCustomer) -> Result<String, GatewayError> {
        let params = [
            ("email", request.email),
            ("name", request.name),
            ("metadata[user_id]", request.user_id.to_string()),
        ];
        let customer: ObjectId = self.post("customers", &params, "create_customer").await?;
        tracing::info!(customer_id = %customer.id, "Stripe customer created");
        Ok(customer.id)
    }

    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let session: SessionWire = self
            .post(
                "checkout/sessions",
                &checkout_params(&request),
                "create_checkout_session",
            )
            .await?;
        Ok(session.into())
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, GatewayError> {
        let session: SessionWire = self
            .get(
                &format!("checkout/sessions/{}", session_id),
                &[],
                "retrieve_checkout_session",
            )
            .await?;
        Ok(session.into())
    }

    async fn expire_checkout_session(&self, session_id: &str) -> Result<(), GatewayError> {
        let _: SessionWire = self
            .post(
                &format!("checkout/sessions/{}/expire", session_id),
                &[],
                "expire_checkout_session",
            )
            .await?;
        Ok(())
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscriptionInfo, GatewayError> {
        let sub: SubscriptionWire = self
            .get(
                &format!("subscriptions/{}", subscription_id),
                &[],
                "retrieve_subscription",
            )
            .await?;
        Ok(sub.into())
    }

    async fn update_subscription_price(
        &self,
        subscription_id: &str,
        item_id: &str,
        price_id: &str,
    ) -> Result<StripeSubscriptionInfo, GatewayError> {
        let params = [
            ("items[0][id]", item_id.to_string()),
            ("items[0][price]", price_id.to_string()),
            ("proration_behavior", "always_invoice".to_string()),
        ];
        let sub: SubscriptionWire = self
            .post(
                &format!("subscriptions/{}", subscription_id),
                &params,
                "update_subscription_price",
            )
            .await?;
        Ok(sub.into())
    }

    async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel_at_period_end: bool,
    ) -> Result<StripeSubscriptionInfo, GatewayError> {
        let params = [("cancel_at_period_end", cancel_at_period_end.to_string())];
        let sub: SubscriptionWire = self
            .post(
                &format!("subscriptions/{}", subscription_id),
                &params,
                "set_cancel_at_period_end",
            )
            .await?;
        Ok(sub.into())
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscriptionInfo, GatewayError> {
        let url = self.url(&format!("subscriptions/{}", subscription_id));
        let sub: SubscriptionWire = self
            .send(self.http_client.delete(url), "cancel_subscription")
            .await?;
        Ok(sub.into())
    }

    async fn list_invoices(
        &self,
        customer_id: &str,
        limit: u32,
    ) -> Result<Vec<StripeInvoice>, GatewayError> {
        let query = [
            ("customer", customer_id.to_string()),
            ("limit", limit.to_string()),
        ];
        let list: List<InvoiceWire> = self.get("invoices", &query, "list_invoices").await?;
        Ok(list.data.into_iter().map(Into::into).collect())
    }

    async fn create_price(&self, request: CreatePriceRequest) -> Result<String, GatewayError> {
        let params = price_params(&request, &self.config.currency);
        let pairs: Vec<(&str, String)> = params
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();
        let price: ObjectId = self.post("prices", &pairs, "create_price").await?;
        tracing::info!(price_id = %price.id, product = %request.product_name, "Stripe price created");
        Ok(price.id)
    }
}
