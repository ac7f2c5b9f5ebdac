//! HTTP adapter for the plan catalog.
//!
//! - `GET /api/plans` - Active plans (public)
//! - `POST /api/plans` - Create a plan
//! - `PUT /api/plans/:plan_id` - Update a plan

pub mod dto;
mod handlers;

use axum::{
    routing::{get, put},
    Router,
};

use crate::adapters::http::state::BillingAppState;
use handlers::{create_plan, list_plans, update_plan};

pub fn plan_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/", get(list_plans).post(create_plan))
        .route("/:plan_id", put(update_plan))
}
