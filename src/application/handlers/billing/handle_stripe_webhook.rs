//! HandleStripeWebhookHandler - reconciles signed Stripe events.

use std::sync::Arc;

use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info};

use crate::application::providers::mirror_status;
use crate::application::user_locks::UserLocks;
use crate::domain::billing::{
    BillingError, CheckoutSessionObject, Provider, StripeEvent, StripeEventType,
    StripeWebhookVerifier, Subscription, SubscriptionObject, WebhookError,
};
use crate::ports::{
    BillingProvider, SubscriptionRepository, WebhookEventRecord, WebhookEventRepository,
    WebhookResult,
};

use super::webhook_ledger;

/// A raw Stripe delivery. The body must be the exact bytes received; the
/// signature covers them.
#[derive(Debug, Clone)]
pub struct HandleStripeWebhookCommand {
    pub payload: Vec<u8>,
    /// Value of the `Stripe-Signature` header.
    pub signature: String,
}

/// Handler for Stripe webhooks.
///
/// - `checkout.session.completed` resolves the checkout placeholder to the
///   real subscription, fetched fresh from Stripe.
/// - `customer.subscription.updated` / `.deleted` mirror status, period end
///   and the cancel-at-period-end flag.
///
/// Everything else is acknowledged and dropped.
pub struct HandleStripeWebhookHandler {
    verifier: StripeWebhookVerifier,
    subscriptions: Arc<dyn SubscriptionRepository>,
    events: Arc<dyn WebhookEventRepository>,
    stripe: Arc<dyn BillingProvider>,
    locks: Arc<UserLocks>,
}

impl HandleStripeWebhookHandler {
    pub fn new(
        verifier: StripeWebhookVerifier,
        subscriptions: Arc<dyn SubscriptionRepository>,
        events: Arc<dyn WebhookEventRepository>,
        stripe: Arc<dyn BillingProvider>,
        locks: Arc<UserLocks>,
    ) -> Self {
        Self {
            verifier,
            subscriptions,
            events,
            stripe,
            locks,
        }
    }

    pub async fn handle(&self, cmd: HandleStripeWebhookCommand) -> Result<WebhookResult, WebhookError> {
        // 1. Verify signature and parse
        let event = self.verifier.verify_and_parse(&cmd.payload, &cmd.signature)?;
        let payload =
            serde_json::to_value(&event).map_err(|e| WebhookError::ParseError(e.to_string()))?;

        // 2. Replays of finished events return early
        if webhook_ledger::already_handled(self.events.as_ref(), Provider::Stripe, &event.id).await? {
            info!(event_id = %event.id, "Stripe event already processed");
            return Ok(WebhookResult::AlreadyProcessed);
        }

        // 3. Dispatch
        let applied = match event.parsed_type() {
            StripeEventType::CheckoutSessionCompleted => self.apply_checkout_completed(&event).await,
            StripeEventType::CustomerSubscriptionUpdated
            | StripeEventType::CustomerSubscriptionDeleted => {
                self.apply_subscription_change(&event).await
            }
            StripeEventType::Unknown => {
                debug!(event_type = %event.event_type, "Ignoring Stripe event");
                webhook_ledger::record(
                    self.events.as_ref(),
                    WebhookEventRecord::ignored(
                        Provider::Stripe,
                        &event.id,
                        &event.event_type,
                        "event not handled",
                        payload,
                    ),
                )
                .await?;
                return Ok(WebhookResult::Ignored);
            }
        };

        // 4. Ledger
        let (record, result) =
            webhook_ledger::settle(Provider::Stripe, &event.id, &event.event_type, payload, applied);
        webhook_ledger::record(self.events.as_ref(), record).await?;
        result
    }

    async fn apply_checkout_completed(&self, event: &StripeEvent) -> Result<(), BillingError> {
        let session: CheckoutSessionObject = event
            .deserialize_object()
            .map_err(|e| BillingError::inconsistency(format!("malformed checkout session: {}", e)))?;

        let Some(stripe_subscription_id) = session.subscription.as_deref() else {
            return Err(BillingError::inconsistency(format!(
                "checkout session {} completed without a subscription",
                session.id
            )));
        };

        // Found by placeholder on first delivery, by real id once confirmed.
        let found = match self
            .subscriptions
            .find_by_provider_reference(Provider::Stripe, &session.id)
            .await?
        {
            Some(subscription) => Some(subscription),
            None => {
                self.subscriptions
                    .find_by_provider_reference(Provider::Stripe, stripe_subscription_id)
                    .await?
            }
        };
        let found = found.ok_or_else(|| {
            BillingError::inconsistency(format!(
                "no subscription for checkout session {}",
                session.id
            ))
        })?;
        let (_guard, mut subscription) = self.lock_fresh(found).await?;

        self.stripe.refresh_status(&mut subscription).await?;
        self.subscriptions.update(&subscription, None).await?;

        info!(
            subscription_id = %subscription.id,
            stripe_subscription_id,
            status = %subscription.status,
            "Stripe checkout completed"
        );
        Ok(())
    }

    async fn apply_subscription_change(&self, event: &StripeEvent) -> Result<(), BillingError> {
        let object: SubscriptionObject = event
            .deserialize_object()
            .map_err(|e| BillingError::inconsistency(format!("malformed subscription: {}", e)))?;

        let found = self
            .subscriptions
            .find_by_provider_reference(Provider::Stripe, &object.id)
            .await?
            .ok_or_else(|| {
                BillingError::inconsistency(format!("unknown Stripe subscription {}", object.id))
            })?;
        let (_guard, mut subscription) = self.lock_fresh(found).await?;

        mirror_status(
            &mut subscription,
            object.canonical_status(),
            Some(object.status.clone()),
            object.period_end(),
            Some(object.cancel_at_period_end),
        )?;
        self.subscriptions.update(&subscription, None).await?;
        Ok(())
    }

    /// Takes the owner's lock and re-reads the subscription under it, so a
    /// lifecycle command that finished meanwhile is not overwritten.
    async fn lock_fresh(
        &self,
        found: Subscription,
    ) -> Result<(OwnedMutexGuard<()>, Subscription), BillingError> {
        let guard = self.locks.acquire(&found.user_id).await;
        let subscription = self
            .subscriptions
            .find_by_id(&found.id)
            .await?
            .ok_or_else(|| {
                BillingError::inconsistency(format!("subscription {} disappeared", found.id))
            })?;
        Ok((guard, subscription))
    }
}
