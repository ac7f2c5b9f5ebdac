//! Plans and provider customer links.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::billing::{CustomerLink, Plan, Provider};
use crate::domain::foundation::{DomainError, ErrorCode, PlanId, UserId};
use crate::ports::{CustomerRepository, PlanRepository};

/// In-memory plan catalog.
#[derive(Default)]
pub struct InMemoryPlanRepository {
    plans: RwLock<Vec<Plan>>,
}

impl InMemoryPlanRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog holding the given plans.
    pub fn with_plans(plans: Vec<Plan>) -> Self {
        Self {
            plans: RwLock::new(plans),
        }
    }
}

#[async_trait]
impl PlanRepository for InMemoryPlanRepository {
    async fn find_by_id(&self, id: &PlanId) -> Result<Option<Plan>, DomainError> {
        let plans = self.plans.read().expect("InMemoryPlanRepository: lock poisoned");
        Ok(plans.iter().find(|p| &p.id == id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<Plan>, DomainError> {
        let plans = self.plans.read().expect("InMemoryPlanRepository: lock poisoned");
        let mut active: Vec<Plan> = plans.iter().filter(|p| p.active).cloned().collect();
        active.sort_by_key(|p| p.price);
        Ok(active)
    }

    async fn insert(&self, plan: &Plan) -> Result<(), DomainError> {
        let mut plans = self.plans.write().expect("InMemoryPlanRepository: lock poisoned");
        plans.push(plan.clone());
        Ok(())
    }

    async fn update(&self, plan: &Plan) -> Result<(), DomainError> {
        let mut plans = self.plans.write().expect("InMemoryPlanRepository: lock poisoned");
        let stored = plans
            .iter_mut()
            .find(|p| p.id == plan.id)
            .ok_or_else(|| DomainError::not_found(ErrorCode::PlanNotFound, "Plan", plan.id))?;
        *stored = plan.clone();
        Ok(())
    }
}

/// In-memory customer links keyed by `(user, provider)`.
#[derive(Default)]
pub struct InMemoryCustomerRepository {
    links: RwLock<HashMap<(UserId, Provider), CustomerLink>>,
}

impl InMemoryCustomerRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn find(
        &self,
        user_id: &UserId,
        provider: Provider,
    ) -> Result<Option<CustomerLink>, DomainError> {
        let links = self.links.read().expect("InMemoryCustomerRepository: lock poisoned");
        Ok(links.get(&(user_id.clone(), provider)).cloned())
    }

    async fn insert(&self, link: &CustomerLink) -> Result<CustomerLink, DomainError> {
        let mut links = self.links.write().expect("InMemoryCustomerRepository: lock poisoned");
        Ok(links
            .entry((link.user_id.clone(), link.provider))
            .or_insert_with(|| link.clone())
            .clone())
    }
}
