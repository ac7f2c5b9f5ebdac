//! Plan catalog port.

use async_trait::async_trait;

use crate::domain::billing::Plan;
use crate::domain::foundation::{DomainError, PlanId};

#[async_trait]
pub trait PlanRepository: Send + Sync {
    async fn find_by_id(&self, id: &PlanId) -> Result<Option<Plan>, DomainError>;

    /// Active plans, cheapest first.
    async fn list_active(&self) -> Result<Vec<Plan>, DomainError>;

    async fn insert(&self, plan: &Plan) -> Result<(), DomainError>;

    /// # Errors
    ///
    /// - `PlanNotFound` if the plan does not exist
    async fn update(&self, plan: &Plan) -> Result<(), DomainError>;
}
