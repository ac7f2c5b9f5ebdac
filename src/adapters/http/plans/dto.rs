//! Request and response bodies for `/api/plans`.

use serde::{Deserialize, Serialize};

use crate::application::handlers::plans::{CreatePlanCommand, UpdatePlanCommand};
use crate::domain::billing::{BillingError, BillingInterval, Plan};
use crate::domain::foundation::{Money, PlanId};

/// Body of `POST /api/plans`. `price` is in reais (`49.9`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePlanRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    pub price: Option<f64>,
    /// `week`, `month` or `year`; monthly when absent.
    pub interval: Option<String>,
}

impl CreatePlanRequest {
    pub fn into_command(self) -> Result<CreatePlanCommand, BillingError> {
        let price = self
            .price
            .ok_or_else(|| BillingError::validation("price", "Price is required"))?;

        Ok(CreatePlanCommand {
            name: self.name.unwrap_or_default(),
            description: self.description,
            features: self.features,
            price: parse_price(price)?,
            interval: parse_interval(self.interval.as_deref())?.unwrap_or(BillingInterval::Month),
        })
    }
}

/// Body of `PUT /api/plans/:plan_id`. Absent fields stay unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePlanRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub features: Option<Vec<String>>,
    pub price: Option<f64>,
    pub interval: Option<String>,
    pub active: Option<bool>,
}

impl UpdatePlanRequest {
    pub fn into_command(self, plan_id: PlanId) -> Result<UpdatePlanCommand, BillingError> {
        Ok(UpdatePlanCommand {
            plan_id,
            name: self.name,
            description: self.description,
            features: self.features,
            price: self.price.map(parse_price).transpose()?,
            interval: parse_interval(self.interval.as_deref())?,
            active: self.active,
        })
    }
}

fn parse_price(value: f64) -> Result<Money, BillingError> {
    Money::from_decimal(value).map_err(|e| BillingError::validation("price", e.to_string()))
}

fn parse_interval(value: Option<&str>) -> Result<Option<BillingInterval>, BillingError> {
    value
        .map(|v| {
            v.parse::<BillingInterval>()
                .map_err(|e| BillingError::validation("interval", e.to_string()))
        })
        .transpose()
}

#[derive(Debug, Clone, Serialize)]
pub struct PlansResponse {
    pub plans: Vec<Plan>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanResponse {
    pub plan: Plan,
}
