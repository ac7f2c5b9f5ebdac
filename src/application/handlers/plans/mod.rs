//! Plan catalog handlers.
//!
//! Plans are sold through both providers. Creating or repricing a plan
//! creates the matching Stripe price first so card checkout can use it.

mod create_plan;
mod list_plans;
mod update_plan;

pub use create_plan::{CreatePlanCommand, CreatePlanHandler};
pub use list_plans::{ListPlansHandler, ListPlansQuery};
pub use update_plan::{UpdatePlanCommand, UpdatePlanHandler};
