//! HTTP adapter for Stripe.
//!
//! - `GET /api/stripe/subscription` - The caller's live Stripe subscription
//! - `GET /api/stripe/invoices` - Invoices for the caller
//! - `POST /api/stripe/webhook` - Signed webhook events

mod handlers;

use axum::{
    routing::{get, post},
    Router,
};

use crate::adapters::http::state::BillingAppState;
use handlers::{current_subscription, handle_webhook, list_invoices};

pub use handlers::STRIPE_SIGNATURE_HEADER;

/// Create the Stripe router.
///
/// `/webhook` skips user auth; the signature is verified by the handler.
pub fn stripe_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/subscription", get(current_subscription))
        .route("/invoices", get(list_invoices))
        .route("/webhook", post(handle_webhook))
}
