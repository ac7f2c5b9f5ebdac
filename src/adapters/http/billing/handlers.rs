//! HTTP handlers for `/api/billing`.
//!
//! Every route requires an authenticated user; the subscription owner is
//! always the caller.

use axum::extract::{Json, State};
use axum::response::IntoResponse;

use crate::application::handlers::billing::{
    CancelSubscriptionCommand, ChangePlanCommand, CreateSubscriptionCommand,
    GetBillingSummaryQuery, GetPaymentStatusQuery, ReactivateSubscriptionCommand,
};
use crate::domain::billing::BillingError;

use super::dto::{
    parse_plan_id, ChangePlanRequest, PaymentStatusResponse, SubscribeRequest, SubscribeResponse,
    SubscriptionResponse,
};
use crate::adapters::http::error::BillingApiError;
use crate::adapters::http::middleware::RequireAuth;
use crate::adapters::http::state::BillingAppState;

// ════════════════════════════════════════════════════════════════════════════════
// Queries
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/billing - Billing summary of the latest subscription
pub async fn get_billing_summary(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, BillingApiError> {
    let summary = state
        .billing_summary_handler()
        .handle(GetBillingSummaryQuery { user_id: user.id })
        .await?;

    Ok(Json(summary))
}

/// GET /api/billing/payment-status - Status of the latest subscription
pub async fn get_payment_status(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, BillingApiError> {
    let result = state
        .payment_status_handler()
        .handle(GetPaymentStatusQuery { user_id: user.id })
        .await;

    match result {
        Ok(view) => Ok(Json(PaymentStatusResponse::Current(view))),
        Err(BillingError::NotFound { ref resource, .. }) if resource == "subscription" => {
            Ok(Json(PaymentStatusResponse::no_subscription()))
        }
        Err(err) => Err(err.into()),
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Commands
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/billing/subscribe - Start a subscription with Stripe or Asaas
pub async fn subscribe(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<SubscribeRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let cmd = CreateSubscriptionCommand {
        user_id: user.id,
        plan_id: parse_plan_id(request.plan_id.as_deref())?,
        provider: request.provider()?,
        return_urls: request.return_urls(),
    };

    let result = state.create_subscription_handler().handle(cmd).await?;

    Ok(Json(SubscribeResponse::from(result)))
}

/// POST /api/billing/cancel - Cancel the live subscription immediately
pub async fn cancel(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, BillingApiError> {
    let subscription = state
        .cancel_subscription_handler()
        .handle(CancelSubscriptionCommand { user_id: user.id })
        .await?;

    Ok(Json(SubscriptionResponse::from(subscription)))
}

/// POST /api/billing/reactivate - Undo a cancel-at-period-end
pub async fn reactivate(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, BillingApiError> {
    let result = state
        .reactivate_subscription_handler()
        .handle(ReactivateSubscriptionCommand { user_id: user.id })
        .await?;

    Ok(Json(SubscriptionResponse::from(result)))
}

/// POST /api/billing/change-plan - Move the live subscription to another plan
pub async fn change_plan(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<ChangePlanRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let cmd = ChangePlanCommand {
        user_id: user.id,
        plan_id: parse_plan_id(request.plan_id.as_deref())?,
    };

    let result = state.change_plan_handler().handle(cmd).await?;

    Ok(Json(SubscriptionResponse::from(result)))
}
