//! HTTP handlers for `/api/plans`.

use axum::extract::{Json, Path, State};
use axum::response::IntoResponse;

use crate::application::handlers::plans::ListPlansQuery;
use crate::domain::billing::BillingError;
use crate::domain::foundation::PlanId;

use super::dto::{CreatePlanRequest, PlanResponse, PlansResponse, UpdatePlanRequest};
use crate::adapters::http::error::BillingApiError;
use crate::adapters::http::middleware::RequireAuth;
use crate::adapters::http::state::BillingAppState;

/// GET /api/plans - Active plans, cheapest first (public)
pub async fn list_plans(
    State(state): State<BillingAppState>,
) -> Result<impl IntoResponse, BillingApiError> {
    let plans = state.list_plans_handler().handle(ListPlansQuery).await?;
    Ok(Json(PlansResponse { plans }))
}

/// POST /api/plans - Create a plan and its Stripe price
pub async fn create_plan(
    State(state): State<BillingAppState>,
    RequireAuth(_user): RequireAuth,
    Json(request): Json<CreatePlanRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let plan = state
        .create_plan_handler()
        .handle(request.into_command()?)
        .await?;

    Ok(Json(PlanResponse { plan }))
}

/// PUT /api/plans/:plan_id - Edit a plan
pub async fn update_plan(
    State(state): State<BillingAppState>,
    RequireAuth(_user): RequireAuth,
    Path(plan_id): Path<String>,
    Json(request): Json<UpdatePlanRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let plan_id = plan_id
        .parse::<PlanId>()
        .map_err(|_| BillingError::plan_not_found())?;

    let plan = state
        .update_plan_handler()
        .handle(request.into_command(plan_id)?)
        .await?;

    Ok(Json(PlanResponse { plan }))
}
