//! HTTP adapter for the subscription lifecycle.
//!
//! - `GET /api/billing` - Billing summary
//! - `GET /api/billing/payment-status` - Payment status of the latest subscription
//! - `POST /api/billing/subscribe` - Subscribe through Stripe or Asaas
//! - `POST /api/billing/cancel` - Cancel
//! - `POST /api/billing/reactivate` - Reactivate
//! - `POST /api/billing/change-plan` - Change plan

pub mod dto;
mod handlers;
mod routes;

pub use routes::billing_routes;
