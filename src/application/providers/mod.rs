//! Provider capability implementations.
//!
//! [`StripeBilling`] and [`AsaasBilling`] implement [`BillingProvider`] over
//! their gateways; [`BillingProviders`] hands the right one to a handler.

mod asaas_billing;
mod stripe_billing;

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::billing::{BillingError, Provider, Subscription, SubscriptionStatus};
use crate::domain::foundation::Timestamp;
use crate::ports::BillingProvider;

pub use asaas_billing::AsaasBilling;
pub use stripe_billing::{StripeBilling, INVOICE_PAGE_SIZE};

/// Both providers, selected by tag.
#[derive(Clone)]
pub struct BillingProviders {
    stripe: Arc<dyn BillingProvider>,
    asaas: Arc<dyn BillingProvider>,
}

impl BillingProviders {
    pub fn new(stripe: Arc<dyn BillingProvider>, asaas: Arc<dyn BillingProvider>) -> Self {
        Self { stripe, asaas }
    }

    pub fn get(&self, provider: Provider) -> Arc<dyn BillingProvider> {
        match provider {
            Provider::Stripe => self.stripe.clone(),
            Provider::Asaas => self.asaas.clone(),
        }
    }
}

/// Mirrors a provider-reported status onto the aggregate.
///
/// A subscription we cancelled outright stays cancelled whatever the
/// provider says; that report is logged and dropped. A cancel the provider
/// reported itself is followed back out when the provider recovers.
pub(crate) fn mirror_status(
    subscription: &mut Subscription,
    status: SubscriptionStatus,
    raw_status: Option<String>,
    current_period_end: Option<Timestamp>,
    cancel_at_period_end: Option<bool>,
) -> Result<(), BillingError> {
    if subscription.is_hard_cancelled() && status != SubscriptionStatus::Cancelled {
        warn!(
            subscription_id = %subscription.id,
            provider = %subscription.provider,
            reported = %status,
            "Provider reports a live subscription that was cancelled locally"
        );
        return Ok(());
    }

    let previous = subscription.status;
    subscription.apply_provider_status(status, raw_status, current_period_end, cancel_at_period_end)?;
    if previous != status {
        info!(
            subscription_id = %subscription.id,
            provider = %subscription.provider,
            from = %previous,
            to = %status,
            "Subscription status changed"
        );
    }
    Ok(())
}
