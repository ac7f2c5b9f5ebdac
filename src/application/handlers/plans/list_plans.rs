//! ListPlansHandler - the public plan catalog.

use std::sync::Arc;

use crate::domain::billing::{BillingError, Plan};
use crate::ports::PlanRepository;

#[derive(Debug, Clone, Default)]
pub struct ListPlansQuery;

pub struct ListPlansHandler {
    plans: Arc<dyn PlanRepository>,
}

impl ListPlansHandler {
    pub fn new(plans: Arc<dyn PlanRepository>) -> Self {
        Self { plans }
    }

    /// Active plans, cheapest first.
    pub async fn handle(&self, _query: ListPlansQuery) -> Result<Vec<Plan>, BillingError> {
        Ok(self.plans.list_active().await?)
    }
}
