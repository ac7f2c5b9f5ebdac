//! Router for `/api/billing`.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    cancel, change_plan, get_billing_summary, get_payment_status, reactivate, subscribe,
};
use crate::adapters::http::state::BillingAppState;

/// Create the billing router.
///
/// # Routes (all require authentication)
/// - `GET /` - Billing summary
/// - `GET /payment-status` - Status of the latest subscription
/// - `POST /subscribe` - Start a subscription
/// - `POST /cancel` - Cancel immediately
/// - `POST /reactivate` - Reactivate a subscription cancelled at period end
/// - `POST /change-plan` - Change plan
pub fn billing_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/", get(get_billing_summary))
        .route("/payment-status", get(get_payment_status))
        .route("/subscribe", post(subscribe))
        .route("/cancel", post(cancel))
        .route("/reactivate", post(reactivate))
        .route("/change-plan", post(change_plan))
}
