//! HTTP handlers for `/api/stripe`.

use axum::body::Bytes;
use axum::extract::{Json, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::application::handlers::billing::{
    GetProviderSubscriptionQuery, HandleStripeWebhookCommand, ListInvoicesQuery,
    SubscriptionLookup,
};
use crate::domain::billing::{Provider, Subscription, WebhookError};
use crate::ports::{StripeInvoice, StripeSubscriptionInfo};

use crate::adapters::http::dto::WebhookAck;
use crate::adapters::http::error::{BillingApiError, WebhookApiError};
use crate::adapters::http::middleware::RequireAuth;
use crate::adapters::http::state::BillingAppState;

/// Header carrying the Stripe webhook signature.
pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Clone, Serialize)]
pub struct InvoicesResponse {
    pub invoices: Vec<StripeInvoice>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StripeSubscriptionResponse {
    pub subscription: Option<Subscription>,
    /// Stripe's own record; absent until the checkout completes.
    pub stripe_details: Option<StripeSubscriptionInfo>,
}

/// GET /api/stripe/subscription - The caller's pending or active Stripe subscription
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
            provider: Provider::Stripe,
            lookup: SubscriptionLookup::Current,
        })
        .await?;

    Ok(Json(StripeSubscriptionResponse {
        stripe_details: view.stripe_details(),
        subscription: view.subscription,
    }))
}

/// GET /api/stripe/invoices - Invoices of the caller's Stripe customer
pub async fn list_invoices(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, BillingApiError> {
    let invoices = state
        .invoices_handler()
        .handle(ListInvoicesQuery { user_id: user.id })
        .await?;

    Ok(Json(InvoicesResponse { invoices }))
}

/// POST /api/stripe/webhook - Signed Stripe events
///
/// The body is taken as raw bytes; the signature covers them exactly.
pub async fn handle_webhook(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingField("Stripe-Signature"))?;

    let result = state
        .stripe_webhook_handler()
        .handle(HandleStripeWebhookCommand {
            payload: body.to_vec(),
            signature: signature.to_string(),
        })
        .await?;

    Ok(Json(WebhookAck::from(result)))
}
