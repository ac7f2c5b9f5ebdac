//! Provider customer resolution shared by the lifecycle handlers.

use tracing::{info, warn};

use crate::domain::billing::{BillingError, CustomerLink};
use crate::domain::foundation::UserId;
use crate::ports::{BillingProvider, CustomerRepository, UserDirectory};

/// Returns the user's customer id at the provider, creating it on first use.
///
/// The link is written first-wins, so two racing creates converge on the
/// same stored id even if the provider ends up with an orphan customer.
pub(crate) async fn ensure_customer(
    customers: &dyn CustomerRepository,
    users: &dyn UserDirectory,
    billing: &dyn BillingProvider,
    user_id: &UserId,
) -> Result<String, BillingError> {
    let provider = billing.provider();

    if let Some(link) = customers.find(user_id, provider).await? {
        return Ok(link.provider_customer_id);
    }

    let profile = users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| BillingError::unauthorized("User not found"))?;

    let created = billing.create_customer(&profile).await?;
    let stored = customers
        .insert(&CustomerLink::new(user_id.clone(), provider, created.clone()))
        .await?;

    if stored.provider_customer_id != created {
        warn!(
            user_id = %user_id,
            provider = %provider,
            orphaned_customer_id = %created,
            "Concurrent customer creation; keeping the stored customer"
        );
    } else {
        info!(user_id = %user_id, provider = %provider, customer_id = %created, "Provider customer created");
    }

    Ok(stored.provider_customer_id)
}
