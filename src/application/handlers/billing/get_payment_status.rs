//! GetPaymentStatusHandler - polled by the checkout page while the user pays.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::application::providers::BillingProviders;
use crate::application::user_locks::UserLocks;
use crate::domain::billing::{BillingError, Payment, Provider, SubscriptionStatus};
use crate::domain::foundation::{SubscriptionId, UserId};
use crate::ports::{PaymentRepository, SubscriptionRepository};

#[derive(Debug, Clone)]
pub struct GetPaymentStatusQuery {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusView {
    pub subscription_id: SubscriptionId,
    pub provider: Provider,
    pub status: SubscriptionStatus,

    /// Stripe checkout still waiting for the customer.
    pub checkout_url: Option<String>,

    /// Latest Asaas charge, with a fresh QR code while it is unpaid.
    pub payment: Option<Payment>,
}

pub struct GetPaymentStatusHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    payments: Arc<dyn PaymentRepository>,
    providers: BillingProviders,
    locks: Arc<UserLocks>,
}

impl GetPaymentStatusHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        payments: Arc<dyn PaymentRepository>,
        providers: BillingProviders,
        locks: Arc<UserLocks>,
    ) -> Self {
        Self {
            subscriptions,
            payments,
            providers,
            locks,
        }
    }

    pub async fn handle(&self, query: GetPaymentStatusQuery) -> Result<PaymentStatusView, BillingError> {
        let _guard = self.locks.acquire(&query.user_id).await;

        // 1. Latest subscription
        let mut subscription = self
            .subscriptions
            .find_latest_for_user(&query.user_id)
            .await?
            .ok_or_else(BillingError::subscription_not_found)?;

        // 2. Refresh while the outcome is still open
        if subscription.status == SubscriptionStatus::Pending {
            let billing = self.providers.get(subscription.provider);
            match billing.refresh_status(&mut subscription).await {
                Ok(_) => self.subscriptions.update(&subscription, None).await?,
                Err(err @ BillingError::Provider { .. }) => {
                    warn!(
                        subscription_id = %subscription.id,
                        error = %err,
                        "Provider refresh failed; reporting stored status"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        // 3. Latest charge (Asaas only)
        let payment = match subscription.provider {
            Provider::Asaas => self.payments.latest_for_subscription(&subscription.id).await?,
            Provider::Stripe => None,
        };

        Ok(PaymentStatusView {
            subscription_id: subscription.id,
            provider: subscription.provider,
            status: subscription.status,
            checkout_url: subscription.checkout_url,
            payment,
        })
    }
}
