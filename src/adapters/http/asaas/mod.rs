//! HTTP adapter for Asaas.
//!
//! - `GET /api/asaas/subscriptions` - The caller's live Asaas subscription
//! - `GET /api/asaas/subscription/:subscription_id` - One Asaas subscription, synced
//! - `GET /api/asaas/payment/:payment_id` - PIX payment with a fresh QR code
//! - `POST /api/asaas/webhook` - Payment notifications

mod handlers;

use axum::{
    routing::{get, post},
    Router,
};

use crate::adapters::http::state::BillingAppState;
use handlers::{current_subscription, get_payment, get_subscription, handle_webhook};

/// Create the Asaas router.
///
/// `/webhook` is not behind user auth; it checks the shared token instead.
pub fn asaas_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/subscriptions", get(current_subscription))
        .route("/subscription/:subscription_id", get(get_subscription))
        .route("/payment/:payment_id", get(get_payment))
        .route("/webhook", post(handle_webhook))
}
