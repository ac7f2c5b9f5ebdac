//! ReactivateSubscriptionHandler - undoes a cancel-at-period-end.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::application::providers::BillingProviders;
use crate::application::user_locks::UserLocks;
use crate::domain::billing::{BillingError, Payment, Subscription};
use crate::domain::foundation::UserId;
use crate::ports::SubscriptionRepository;

#[derive(Debug, Clone)]
pub struct ReactivateSubscriptionCommand {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactivateSubscriptionResult {
    pub subscription: Subscription,

    /// Asaas reactivation opens a new subscription whose first charge must
    /// be paid again.
    pub payment: Option<Payment>,
}

pub struct ReactivateSubscriptionHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    providers: BillingProviders,
    locks: Arc<UserLocks>,
}

impl ReactivateSubscriptionHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        providers: BillingProviders,
        locks: Arc<UserLocks>,
    ) -> Self {
        Self {
            subscriptions,
            providers,
            locks,
        }
    }

    pub async fn handle(
        &self,
        cmd: ReactivateSubscriptionCommand,
    ) -> Result<ReactivateSubscriptionResult, BillingError> {
        // 1. Serialize with other lifecycle commands
        let _guard = self.locks.acquire(&cmd.user_id).await;

        // 2. A live subscription already holds the slot
        if self
            .subscriptions
            .find_current_for_user(&cmd.user_id)
            .await?
            .is_some()
        {
            return Err(BillingError::already_subscribed());
        }

        // 3. Only a cancel-at-period-end can be undone
        let mut subscription = self
            .subscriptions
            .find_reactivatable_for_user(&cmd.user_id)
            .await?
            .ok_or_else(|| {
                BillingError::not_found("subscription", "No cancelled subscription to reactivate")
            })?;

        // 4. Provider side
        let billing = self.providers.get(subscription.provider);
        let payment = billing.reactivate(&mut subscription).await?;

        // 5. Persist, dropping a freshly opened provider subscription on failure
        if let Err(err) = self.subscriptions.update(&subscription, payment.as_ref()).await {
            if payment.is_some() {
                warn!(
                    subscription_id = %subscription.id,
                    error = %err,
                    "Could not store reactivation; discarding the new provider subscription"
                );
                if let Err(discard_err) = billing.discard(&subscription).await {
                    error!(
                        subscription_id = %subscription.id,
                        provider_reference = %subscription.provider_subscription.reference.external_id(),
                        error = %discard_err,
                        "Failed to discard provider subscription"
                    );
                }
            } else {
                error!(
                    subscription_id = %subscription.id,
                    provider = %subscription.provider,
                    error = %err,
                    "Subscription reactivated at provider but not stored"
                );
            }
            return Err(err.into());
        }

        info!(
            user_id = %cmd.user_id,
            subscription_id = %subscription.id,
            provider = %subscription.provider,
            status = %subscription.status,
            "Subscription reactivated"
        );

        Ok(ReactivateSubscriptionResult {
            subscription,
            payment,
        })
    }
}
