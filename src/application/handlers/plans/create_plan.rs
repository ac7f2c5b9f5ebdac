//! CreatePlanHandler - adds a plan to the catalog.

use std::sync::Arc;

use tracing::info;

use crate::domain::billing::{BillingError, BillingInterval, Plan, Provider};
use crate::domain::foundation::Money;
use crate::ports::{CreatePriceRequest, PlanRepository, StripeGateway};

#[derive(Debug, Clone)]
pub struct CreatePlanCommand {
    pub name: String,
    pub description: Option<String>,
    pub features: Vec<String>,
    pub price: Money,
    pub interval: BillingInterval,
}

/// Handler for creating plans.
///
/// The Stripe price is created before the plan is stored; a Stripe failure
/// leaves the catalog untouched.
pub struct CreatePlanHandler {
    plans: Arc<dyn PlanRepository>,
    stripe: Arc<dyn StripeGateway>,
}

impl CreatePlanHandler {
    pub fn new(plans: Arc<dyn PlanRepository>, stripe: Arc<dyn StripeGateway>) -> Self {
        Self { plans, stripe }
    }

    pub async fn handle(&self, cmd: CreatePlanCommand) -> Result<Plan, BillingError> {
        // 1. Validate locally before touching Stripe
        if cmd.name.trim().is_empty() {
            return Err(BillingError::validation("name", "Plan name is required"));
        }

        // 2. Stripe price
        let price_id = self
            .stripe
            .create_price(CreatePriceRequest::for_plan(
                &cmd.name,
                cmd.description.as_deref(),
                &cmd.features,
                cmd.price,
                cmd.interval,
            ))
            .await
            .map_err(|e| e.into_billing(Provider::Stripe))?;

        // 3. Catalog entry
        let plan = Plan::new(
            cmd.name,
            cmd.description,
            cmd.features,
            cmd.price,
            cmd.interval,
            Some(price_id),
        )?;
        self.plans.insert(&plan).await?;

        info!(plan_id = %plan.id, price = %plan.price, interval = %plan.interval, "Plan created");
        Ok(plan)
    }
}
