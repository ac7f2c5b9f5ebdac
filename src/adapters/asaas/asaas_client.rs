//! Asaas REST client.
//!
//! JSON over HTTPS with the API key in the `access_token` header. Amounts
//! travel as decimal reais and dates as `YYYY-MM-DD`.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::adapters::retry::{with_retry, RetryConfig};
use crate::domain::billing::{BillingInterval, BillingType, PaymentStatus, PixCharge};
use crate::domain::foundation::Money;
use crate::ports::{
    AsaasGateway, AsaasPaymentInfo, AsaasSubscriptionInfo, CreateAsaasCustomer,
    CreateAsaasSubscription, GatewayError, GatewayErrorCode,
};

pub const SANDBOX_BASE_URL: &str = "https://sandbox.asaas.com/api/v3";
pub const PRODUCTION_BASE_URL: &str = "https://api.asaas.com/v3";

/// Charges fetched per page when listing a subscription's payments.
const PAYMENT_PAGE_LIMIT: u32 = 100;

/// Asaas gateway over HTTP.
pub struct AsaasClient {
    api_key: SecretString,
    base_url: String,
    http_client: reqwest::Client,
    retry: RetryConfig,
}

impl AsaasClient {
    pub fn new(api_key: SecretString, base_url: impl Into<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &str,
    ) -> Result<T, GatewayError> {
        let response = request
            .header("access_token", self.api_key.expose_secret())
            .header("User-Agent", "jobboard-billing")
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
                "Asaas request failed"
            );
            return Err(error);
        }

        response.json::<T>().await.map_err(|e| {
            GatewayError::invalid_response(format!("Failed to parse Asaas response: {}", e))
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

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        operation: &str,
    ) -> Result<T, GatewayError> {
        self.send(self.http_client.post(self.url(path)).json(body), operation)
            .await
    }
}

fn error_from_response(status: StatusCode, body: &str) -> GatewayError {
    let first = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.errors.into_iter().next());
    let message = first
        .as_ref()
        .and_then(|e| e.description.clone())
        .unwrap_or_else(|| format!("Asaas API error: {}", body));

    let error = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::authentication(message),
        StatusCode::NOT_FOUND => GatewayError::new(GatewayErrorCode::NotFound, message),
        StatusCode::TOO_MANY_REQUESTS => GatewayError::rate_limited(message),
        s if s.is_server_error() => GatewayError::new(GatewayErrorCode::ServiceUnavailable, message),
        _ => GatewayError::provider(message),
    };
    match first.and_then(|e| e.code) {
        Some(code) => error.with_provider_code(code),
        None => error,
    }
}

fn money(value: f64) -> Result<Money, GatewayError> {
    Money::from_decimal(value)
        .map_err(|e| GatewayError::invalid_response(format!("invalid amount {}: {}", value, e)))
}

// ════════════════════════════════════════════════════════════════════════════
// Wire types
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectId {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    data: Vec<T>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CustomerBody {
    name: String,
    email: String,
    cpf_cnpj: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    mobile_phone: Option<String>,
    notification_disabled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionBody {
    customer: String,
    billing_type: &'static str,
    value: f64,
    next_due_date: String,
    cycle: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl From<&CreateAsaasSubscription> for SubscriptionBody {
    fn from(request: &CreateAsaasSubscription) -> Self {
        SubscriptionBody {
            customer: request.customer_id.clone(),
            billing_type: "PIX",
            value: request.value.as_decimal(),
            next_due_date: request.next_due_date.format("%Y-%m-%d").to_string(),
            cycle: request.cycle.asaas_cycle(),
            description: request.description.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionWire {
    id: String,
    customer: String,
    status: String,
    value: f64,
    cycle: Option<String>,
    next_due_date: Option<NaiveDate>,
    #[serde(default)]
    deleted: bool,
}

impl TryFrom<SubscriptionWire> for AsaasSubscriptionInfo {
    type Error = GatewayError;

    fn try_from(wire: SubscriptionWire) -> Result<Self, Self::Error> {
        Ok(AsaasSubscriptionInfo {
            value: money(wire.value)?,
            cycle: wire.cycle.as_deref().and_then(BillingInterval::from_asaas_cycle),
            id: wire.id,
            customer_id: wire.customer,
            status: wire.status,
            next_due_date: wire.next_due_date,
            deleted: wire.deleted,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentWire {
    id: String,
    customer: String,
    subscription: Option<String>,
    value: f64,
    status: PaymentStatus,
    billing_type: BillingType,
    due_date: NaiveDate,
    invoice_url: Option<String>,
}

impl TryFrom<PaymentWire> for AsaasPaymentInfo {
    type Error = GatewayError;

    fn try_from(wire: PaymentWire) -> Result<Self, Self::Error> {
        Ok(AsaasPaymentInfo {
            value: money(wire.value)?,
            id: wire.id,
            customer_id: wire.customer,
            subscription_id: wire.subscription,
            status: wire.status,
            billing_type: wire.billing_type,
            due_date: wire.due_date,
            invoice_url: wire.invoice_url,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PixQrCodeWire {
    encoded_image: String,
    payload: String,
}

#[async_trait]
impl AsaasGateway for AsaasClient {
    async fn create_customer(&self, request: CreateAsaasCustomer) -> Result<String, GatewayError> {
        let body = CustomerBody {
            name: request.name,
            email: request.email,
            cpf_cnpj: request.cpf_cnpj,
            mobile_phone: request.phone,
            notification_disabled: true,
        };
        let customer: ObjectId = self.post("customers", &body, "create_customer").await?;
        tracing::info!(customer_id = %customer.id, "Asaas customer created");
        Ok(customer.id)
    }

    async fn create_subscription(
        &self,
        request: CreateAsaasSubscription,
    ) -> Result<AsaasSubscriptionInfo, GatewayError> {
        let body = SubscriptionBody::from(&request);
        let wire: SubscriptionWire = self
            .post("subscriptions", &body, "create_subscription")
            .await?;
        wire.try_into()
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<AsaasSubscriptionInfo, GatewayError> {
        let wire: SubscriptionWire = self
            .get(
                &format!("subscriptions/{}", subscription_id),
                &[],
                "get_subscription",
            )
            .await?;
        wire.try_into()
    }

    async fn delete_subscription(&self, subscription_id: &str) -> Result<(), GatewayError> {
        let url = self.url(&format!("subscriptions/{}", subscription_id));
        let result: Result<serde_json::Value, _> = self
            .send(self.http_client.delete(url), "delete_subscription")
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(err) if err.code == GatewayErrorCode::NotFound => {
                tracing::debug!(
                    asaas_subscription_id = %subscription_id,
                    "Asaas subscription already gone"
                );
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn list_subscription_payments(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<AsaasPaymentInfo>, GatewayError> {
        let path = format!("subscriptions/{}/payments", subscription_id);
        let mut payments = Vec::new();
        let mut offset = 0u32;
        loop {
            let query = [
                ("offset", offset.to_string()),
                ("limit", PAYMENT_PAGE_LIMIT.to_string()),
            ];
            let page: Page<PaymentWire> = self
                .get(&path, &query, "list_subscription_payments")
                .await?;
            let fetched = page.data.len() as u32;
            for wire in page.data {
                payments.push(wire.try_into()?);
            }
            if !page.has_more || fetched == 0 {
                return Ok(payments);
            }
            offset += fetched;
        }
    }

    async fn get_payment(&self, payment_id: &str) -> Result<AsaasPaymentInfo, GatewayError> {
        let wire: PaymentWire = self
            .get(&format!("payments/{}", payment_id), &[], "get_payment")
            .await?;
        wire.try_into()
    }

    async fn get_pix_qr_code(&self, payment_id: &str) -> Result<PixCharge, GatewayError> {
        let wire: PixQrCodeWire = self
            .get(
                &format!("payments/{}/pixQrCode", payment_id),
                &[],
                "get_pix_qr_code",
            )
            .await?;
        Ok(PixCharge {
            qr_code_image: wire.encoded_image,
            copy_paste_key: wire.payload,
        })
    }
}
