//! HTTP adapters - REST API over the billing handlers.
//!
//! Routers are grouped by URL prefix and share one [`BillingAppState`]:
//! - `/api/billing` - subscription lifecycle
//! - `/api/asaas` - PIX payments and Asaas webhooks
//! - `/api/stripe` - invoices and Stripe webhooks
//! - `/api/plans` - plan catalog

pub mod asaas;
pub mod billing;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod plans;
mod state;
pub mod stripe;

use axum::{middleware::from_fn_with_state, routing::get, Json, Router};

pub use error::{BillingApiError, ErrorResponse, WebhookApiError};
pub use middleware::{auth_middleware, AuthState, RequireAuth};
pub use state::BillingAppState;

/// Builds the complete API.
///
/// The auth middleware runs on every route. It only rejects requests that
/// carry a bad token; routes needing a user enforce it with [`RequireAuth`],
/// so the public catalog and provider webhooks pass through.
pub fn api_router(state: BillingAppState, auth: AuthState) -> Router {
    Router::new()
        .nest("/api/billing", billing::billing_routes())
        .nest("/api/asaas", asaas::asaas_routes())
        .nest("/api/stripe", stripe::stripe_routes())
        .nest("/api/plans", plans::plan_routes())
        .route("/health", get(health))
        .layer(from_fn_with_state(auth, auth_middleware))
        .with_state(state)
}

/// GET /health - Liveness probe
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "service": env!("CARGO_PKG_NAME") }))
}
