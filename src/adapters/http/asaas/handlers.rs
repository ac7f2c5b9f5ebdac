//! HTTP handlers for `/api/asaas`.

use axum::body::Bytes;
use axum::extract::{Json, Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::application::handlers::billing::{
    GetPaymentQuery, GetProviderSubscriptionQuery, HandleAsaasWebhookCommand,
    ProviderSubscriptionView, SubscriptionLookup,
};
use crate::domain::billing::{Payment, Provider, Subscription, ASAAS_TOKEN_HEADER};

use crate::adapters::http::dto::WebhookAck;
use crate::adapters::http::error::{BillingApiError, WebhookApiError};
use crate::adapters::http::middleware::RequireAuth;
use crate::adapters::http::state::BillingAppState;

#[derive(Debug, Clone, Serialize)]
pub struct PaymentResponse {
    pub payment: Payment,
}

/// Subscription with its charges as last synced from Asaas.
#[derive(Debug, Clone, Serialize)]
pub struct AsaasSubscriptionResponse {
    pub subscription: Option<Subscription>,
    pub payments: Vec<Payment>,
}

impl From<ProviderSubscriptionView> for AsaasSubscriptionResponse {
    fn from(view: ProviderSubscriptionView) -> Self {
        Self {
            payments: view.payments(),
            subscription: view.subscription,
        }
    }
}

/// GET /api/asaas/subscriptions - The caller's pending or active Asaas subscription
///
/// `subscription` is null when there is none.
pub async fn current_subscription(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, BillingApiError> {
    let view = state
        .provider_subscription_handler()
        .handle(GetProviderSubscriptionQuery {
            user_id: user.id,
            provider: Provider::Asaas,
            lookup: SubscriptionLookup::Current,
        })
        .await?;

    Ok(Json(AsaasSubscriptionResponse::from(view)))
}

/// GET /api/asaas/subscription/:subscription_id - One of the caller's Asaas subscriptions
pub async fn get_subscription(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
    Path(subscription_id): Path<String>,
) -> Result<impl IntoResponse, BillingApiError> {
    let view = state
        .provider_subscription_handler()
        .handle(GetProviderSubscriptionQuery {
            user_id: user.id,
            provider: Provider::Asaas,
            lookup: SubscriptionLookup::ProviderId(subscription_id),
        })
        .await?;

    Ok(Json(AsaasSubscriptionResponse::from(view)))
}

/// GET /api/asaas/payment/:payment_id - One PIX payment of the caller
pub async fn get_payment(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
    Path(payment_id): Path<String>,
) -> Result<impl IntoResponse, BillingApiError> {
    let payment = state
        .payment_handler()
        .handle(GetPaymentQuery {
            user_id: user.id,
            payment_id,
        })
        .await?;

    Ok(Json(PaymentResponse { payment }))
}

/// POST /api/asaas/webhook - Asaas payment notifications
///
/// Authenticated by the shared `asaas-access-token` header when configured.
pub async fn handle_webhook(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let token = headers
        .get(ASAAS_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let result = state
        .asaas_webhook_handler()
        .handle(HandleAsaasWebhookCommand {
            token,
            payload: body.to_vec(),
        })
        .await?;

    Ok(Json(WebhookAck::from(result)))
}
