//! UpdatePlanHandler - edits a catalog entry.

use std::sync::Arc;

use tracing::info;

use crate::domain::billing::{BillingError, BillingInterval, Plan, Provider};
use crate::domain::foundation::{Money, PlanId, Timestamp};
use crate::ports::{CreatePriceRequest, PlanRepository, StripeGateway};

/// Partial update. Absent fields are left as they are.
#[derive(Debug, Clone, Default)]
pub struct UpdatePlanCommand {
    pub plan_id: PlanId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub features: Option<Vec<String>>,
    pub price: Option<Money>,
    pub interval: Option<BillingInterval>,
    pub active: Option<bool>,
}

/// Handler for plan edits.
///
/// Stripe prices are immutable, so a new price or interval gets a new Stripe
/// price. Subscriptions already running keep the price they were sold at.
pub struct UpdatePlanHandler {
    plans: Arc<dyn PlanRepository>,
    stripe: Arc<dyn StripeGateway>,
}

impl UpdatePlanHandler {
    pub fn new(plans: Arc<dyn PlanRepository>, stripe: Arc<dyn StripeGateway>) -> Self {
        Self { plans, stripe }
    }

    pub async fn handle(&self, cmd: UpdatePlanCommand) -> Result<Plan, BillingError> {
        // 1. Load
        let mut plan = self
            .plans
            .find_by_id(&cmd.plan_id)
            .await?
            .ok_or_else(BillingError::plan_not_found)?;

        // 2. Apply fields
        if let Some(name) = cmd.name {
            if name.trim().is_empty() {
                return Err(BillingError::validation("name", "Plan name is required"));
            }
            plan.name = name;
        }
        if let Some(description) = cmd.description {
            plan.description = Some(description);
        }
        if let Some(features) = cmd.features {
            plan.features = features;
        }
        if let Some(active) = cmd.active {
            plan.active = active;
        }

        let repriced = cmd.price.is_some_and(|price| price != plan.price)
            || cmd.interval.is_some_and(|interval| interval != plan.interval);
        if let Some(price) = cmd.price {
            plan.price = price;
        }
        if let Some(interval) = cmd.interval {
            plan.interval = interval;
        }

        // 3. New Stripe price when the amount or cadence moved
        if repriced {
            let price_id = self
                .stripe
                .create_price(CreatePriceRequest::for_plan(
                    &plan.name,
                    plan.description.as_deref(),
                    &plan.features,
                    plan.price,
                    plan.interval,
                ))
                .await
                .map_err(|e| e.into_billing(Provider::Stripe))?;
            plan.stripe_price_id = Some(price_id);
        }

        // 4. Persist
        plan.updated_at = Timestamp::now();
        self.plans.update(&plan).await?;

        info!(plan_id = %plan.id, repriced, active = plan.active, "Plan updated");
        Ok(plan)
    }
}
