//! HandleAsaasWebhookHandler - reconciles Asaas payment events.
//!
//! Asaas authenticates webhooks with a shared token header instead of a
//! signature. Payment events update the local charge and then the
//! subscription: the first charge of the current provider subscription
//! decides ACTIVE versus PENDING directly, any later charge triggers a full
//! poll of the provider.

use std::sync::Arc;

use tracing::{debug, info};

use crate::application::providers::mirror_status;
use crate::application::user_locks::UserLocks;
use crate::domain::billing::{
    first_payment, AsaasEventType, AsaasPaymentPayload, AsaasWebhookAuthenticator,
    AsaasWebhookEvent, BillingError, Payment, Provider, Subscription, SubscriptionStatus,
    WebhookError,
};
use crate::domain::foundation::Money;
use crate::ports::{
    BillingProvider, PaymentRepository, SubscriptionRepository, WebhookEventRecord,
    WebhookEventRepository, WebhookResult,
};

use super::webhook_ledger;

/// A raw Asaas delivery.
#[derive(Debug, Clone)]
pub struct HandleAsaasWebhookCommand {
    /// Value of the `asaas-access-token` header.
    pub token: Option<String>,
    pub payload: Vec<u8>,
}

pub struct HandleAsaasWebhookHandler {
    authenticator: AsaasWebhookAuthenticator,
    subscriptions: Arc<dyn SubscriptionRepository>,
    payments: Arc<dyn PaymentRepository>,
    events: Arc<dyn WebhookEventRepository>,
    asaas: Arc<dyn BillingProvider>,
    locks: Arc<UserLocks>,
}

impl HandleAsaasWebhookHandler {
    pub fn new(
        authenticator: AsaasWebhookAuthenticator,
        subscriptions: Arc<dyn SubscriptionRepository>,
        payments: Arc<dyn PaymentRepository>,
        events: Arc<dyn WebhookEventRepository>,
        asaas: Arc<dyn BillingProvider>,
        locks: Arc<UserLocks>,
    ) -> Self {
        Self {
            authenticator,
            subscriptions,
            payments,
            events,
            asaas,
            locks,
        }
    }

    pub async fn handle(&self, cmd: HandleAsaasWebhookCommand) -> Result<WebhookResult, WebhookError> {
        // 1. Shared token
        self.authenticator.verify(cmd.token.as_deref())?;

        // 2. Parse
        let raw: serde_json::Value = serde_json::from_slice(&cmd.payload)
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;
        let event: AsaasWebhookEvent = serde_json::from_value(raw.clone())
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        // 3. Allow-list
        let Some(event_type) = event.event_type() else {
            debug!(event = %event.event, "Ignoring Asaas event outside the allow-list");
            if let Some(id) = &event.id {
                webhook_ledger::record(
                    self.events.as_ref(),
                    WebhookEventRecord::ignored(Provider::Asaas, id, &event.event, "event not handled", raw),
                )
                .await?;
            }
            return Ok(WebhookResult::Ignored);
        };

        // 4. Replays of finished events return early
        if let Some(id) = &event.id {
            if webhook_ledger::already_handled(self.events.as_ref(), Provider::Asaas, id).await? {
                info!(event_id = %id, "Asaas event already processed");
                return Ok(WebhookResult::AlreadyProcessed);
            }
        }

        let payment = event
            .payment
            .as_ref()
            .ok_or(WebhookError::MissingField("payment"))?;

        // 5. Apply
        let applied = self.apply(event_type, payment).await;

        // 6. Ledger; events without an id cannot be deduplicated
        let Some(id) = &event.id else {
            let (_, result) =
                webhook_ledger::settle(Provider::Asaas, "", &event.event, raw, applied);
            return result;
        };
        let (record, result) = webhook_ledger::settle(Provider::Asaas, id, &event.event, raw, applied);
        webhook_ledger::record(self.events.as_ref(), record).await?;
        result
    }

    async fn apply(
        &self,
        event_type: AsaasEventType,
        payload: &AsaasPaymentPayload,
    ) -> Result<(), BillingError> {
        let Some(mut payment) = self.payments.find_by_provider_id(&payload.id).await? else {
            return self.adopt_payment(payload).await;
        };

        payment.update_status(payload.status.clone());
        if event_type.clears_pix() {
            payment.clear_pix();
        }
        if payload.invoice_url.is_some() {
            payment.invoice_url = payload.invoice_url.clone();
        }
        self.payments.update(&payment).await?;

        let subscription = self
            .subscriptions
            .find_by_id(&payment.subscription_id)
            .await?
            .ok_or_else(|| {
                BillingError::inconsistency(format!(
                    "payment {} points at a missing subscription",
                    payment.provider_payment_id
                ))
            })?;

        self.reconcile(subscription, &payment).await
    }

    /// A charge we have not seen yet, typically a renewal. It is stored
    /// against the subscription that owns its provider subscription.
    async fn adopt_payment(&self, payload: &AsaasPaymentPayload) -> Result<(), BillingError> {
        let provider_subscription_id = payload.subscription.as_deref().ok_or_else(|| {
            BillingError::inconsistency(format!("payment {} has no subscription", payload.id))
        })?;

        let subscription = self
            .subscriptions
            .find_by_provider_reference(Provider::Asaas, provider_subscription_id)
            .await?
            .ok_or_else(|| {
                BillingError::inconsistency(format!(
                    "payment {} for unknown Asaas subscription {}",
                    payload.id, provider_subscription_id
                ))
            })?;

        let value = Money::from_decimal(payload.value).map_err(|e| {
            BillingError::inconsistency(format!("payment {} has invalid value: {}", payload.id, e))
        })?;
        let payment = Payment::record(
            payload.id.clone(),
            subscription.id,
            provider_subscription_id,
            payload.customer.clone().unwrap_or_default(),
            value,
            payload.status.clone(),
            payload.billing_type.clone(),
            payload.due_date,
            payload.invoice_url.clone(),
        );
        self.payments.insert(&payment).await?;
        info!(
            subscription_id = %subscription.id,
            payment_id = %payment.provider_payment_id,
            "New Asaas payment recorded from webhook"
        );

        self.reconcile(subscription, &payment).await
    }

    async fn reconcile(&self, found: Subscription, payment: &Payment) -> Result<(), BillingError> {
        let _guard = self.locks.acquire(&found.user_id).await;
        // A lifecycle command may have written it while we waited.
        let mut subscription = self
            .subscriptions
            .find_by_id(&found.id)
            .await?
            .ok_or_else(|| {
                BillingError::inconsistency(format!("subscription {} disappeared", found.id))
            })?;

        if subscription.provider_subscription_id() != Some(payment.provider_subscription_id.as_str()) {
            debug!(
                subscription_id = %subscription.id,
                payment_id = %payment.provider_payment_id,
                "Payment belongs to a replaced provider subscription"
            );
            return Ok(());
        }

        let payments = self.payments.list_for_subscription(&subscription.id).await?;
        let is_first = first_payment(&payments, &payment.provider_subscription_id)
            .map(|first| first.id == payment.id)
            .unwrap_or(false);

        if is_first {
            let status = if payment.status.is_settled() {
                SubscriptionStatus::Active
            } else {
                SubscriptionStatus::Pending
            };
            mirror_status(&mut subscription, status, None, None, None)?;
        } else {
            self.asaas.refresh_status(&mut subscription).await?;
        }

        self.subscriptions.update(&subscription, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::billing::test_support::Harness;
    use crate::domain::billing::PaymentStatus;
    use crate::ports::AsaasPaymentInfo;
    use chrono::Days;

    fn handler(h: &Harness, token: Option<&str>) -> HandleAsaasWebhookHandler {
        HandleAsaasWebhookHandler::new(
            AsaasWebhookAuthenticator::new(token.map(str::to_string)),
            h.store.clone(),
            h.store.clone(),
            h.webhook_events.clone(),
            h.providers.get(Provider::Asaas),
            h.locks.clone(),
        )
    }

    fn delivery(event_id: Option<&str>, event: &str, payment: &Payment, status: &str) -> Vec<u8> {
        serde_json::json!({
            "id": event_id,
            "event": event,
            "payment": {
                "id": payment.provider_payment_id,
                "customer": payment.provider_customer_id,
                "subscription": payment.provider_subscription_id,
                "value": payment.value.as_decimal(),
                "status": status,
                "billingType": "PIX",
                "dueDate": payment.due_date.to_string(),
                "invoiceUrl": payment.invoice_url,
            }
        })
        .to_string()
        .into_bytes()
    }

    fn command(payload: Vec<u8>) -> HandleAsaasWebhookCommand {
        HandleAsaasWebhookCommand {
            token: Some("whtoken".to_string()),
            payload,
        }
    }

    async fn subscribed(h: &Harness) -> Payment {
        h.subscribe(Provider::Asaas, &h.pro)
            .await
            .payment
            .expect("first payment")
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Authentication and parsing
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn wrong_token_is_rejected() {
        let h = Harness::new();
        let payment = subscribed(&h).await;

        let result = handler(&h, Some("whtoken"))
            .handle(HandleAsaasWebhookCommand {
                token: Some("guess".to_string()),
                payload: delivery(Some("evt_1"), "PAYMENT_CONFIRMED", &payment, "CONFIRMED"),
            })
            .await;

        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
        assert_eq!(h.store.subscriptions()[0].status, SubscriptionStatus::Pending);
    }

    #[tokio::test]
    async fn malformed_payload_is_a_parse_error() {
        let h = Harness::new();

        let result = handler(&h, None).handle(command(b"not json".to_vec())).await;

        assert!(matches!(result, Err(WebhookError::ParseError(_))));
    }

    #[tokio::test]
    async fn events_outside_allow_list_are_ignored() {
        let h = Harness::new();
        let payment = subscribed(&h).await;

        let result = handler(&h, Some("whtoken"))
            .handle(command(delivery(Some("evt_1"), "PAYMENT_CREATED", &payment, "PENDING")))
            .await
            .unwrap();

        assert_eq!(result, WebhookResult::Ignored);
        assert_eq!(h.store.payments()[0].status, PaymentStatus::Pending);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Reconciliation
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn confirmed_first_payment_activates_subscription() {
        let h = Harness::new();
        let payment = subscribed(&h).await;

        let result = handler(&h, Some("whtoken"))
            .handle(command(delivery(Some("evt_1"), "PAYMENT_CONFIRMED", &payment, "CONFIRMED")))
            .await
            .unwrap();

        assert_eq!(result, WebhookResult::Processed);
        assert_eq!(h.store.subscriptions()[0].status, SubscriptionStatus::Active);
        assert_eq!(h.store.payments()[0].status, PaymentStatus::Confirmed);
        assert!(!h.asaas.was_called("get_subscription"));
    }

    #[tokio::test]
    async fn replayed_event_is_skipped() {
        let h = Harness::new();
        let payment = subscribed(&h).await;
        let handler = handler(&h, Some("whtoken"));
        let body = delivery(Some("evt_1"), "PAYMENT_CONFIRMED", &payment, "CONFIRMED");
        handler.handle(command(body.clone())).await.unwrap();

        let second = handler.handle(command(body)).await.unwrap();

        assert_eq!(second, WebhookResult::AlreadyProcessed);
        assert_eq!(h.webhook_events.len(), 1);
    }

    #[tokio::test]
    async fn refunded_first_payment_drops_qr_and_returns_to_pending() {
        let h = Harness::new();
        let payment = subscribed(&h).await;
        let handler = handler(&h, Some("whtoken"));
        handler
            .handle(command(delivery(Some("evt_1"), "PAYMENT_RECEIVED", &payment, "RECEIVED")))
            .await
            .unwrap();

        handler
            .handle(command(delivery(Some("evt_2"), "PAYMENT_REFUNDED", &payment, "REFUNDED")))
            .await
            .unwrap();

        let stored = &h.store.payments()[0];
        assert_eq!(stored.status, PaymentStatus::Refunded);
        assert!(stored.pix.is_none());
        assert_eq!(h.store.subscriptions()[0].status, SubscriptionStatus::Pending);
    }

    #[tokio::test]
    async fn renewal_charge_is_adopted_and_polls_provider() {
        let h = Harness::new();
        let first = subscribed(&h).await;
        let handler = handler(&h, Some("whtoken"));
        h.asaas.set_payment_status(&first.provider_payment_id, PaymentStatus::Received);
        handler
            .handle(command(delivery(Some("evt_1"), "PAYMENT_RECEIVED", &first, "RECEIVED")))
            .await
            .unwrap();

        let renewal_due = first.due_date.checked_add_days(Days::new(30)).unwrap();
        h.asaas.add_payment(AsaasPaymentInfo {
            id: "pay_renewal".to_string(),
            customer_id: first.provider_customer_id.clone(),
            subscription_id: Some(first.provider_subscription_id.clone()),
            value: first.value,
            status: PaymentStatus::Pending,
            billing_type: crate::domain::billing::BillingType::Pix,
            due_date: renewal_due,
            invoice_url: None,
        });
        let mut renewal = first.clone();
        renewal.provider_payment_id = "pay_renewal".to_string();
        renewal.due_date = renewal_due;

        let result = handler
            .handle(command(delivery(Some("evt_2"), "PAYMENT_UPDATED", &renewal, "PENDING")))
            .await
            .unwrap();

        assert_eq!(result, WebhookResult::Processed);
        assert_eq!(h.store.payments().len(), 2);
        assert!(h.asaas.was_called("get_subscription"));
        assert_eq!(h.store.subscriptions()[0].status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn unknown_subscription_is_acknowledged() {
        let h = Harness::new();
        let mut stray = subscribed(&h).await;
        stray.provider_payment_id = "pay_stray".to_string();
        stray.provider_subscription_id = "sub_elsewhere".to_string();

        let result = handler(&h, Some("whtoken"))
            .handle(command(delivery(Some("evt_9"), "PAYMENT_CONFIRMED", &stray, "CONFIRMED")))
            .await
            .unwrap();

        assert_eq!(result, WebhookResult::Ignored);
        assert_eq!(h.store.payments().len(), 1);
    }

    #[tokio::test]
    async fn hard_cancelled_subscription_stays_cancelled() {
        let h = Harness::new();
        let payment = subscribed(&h).await;
        let mut sub = h.store.subscriptions()[0].clone();
        sub.cancel().unwrap();
        SubscriptionRepository::update(h.store.as_ref(), &sub, None)
            .await
            .unwrap();

        handler(&h, Some("whtoken"))
            .handle(command(delivery(Some("evt_1"), "PAYMENT_CONFIRMED", &payment, "CONFIRMED")))
            .await
            .unwrap();

        assert_eq!(h.store.subscriptions()[0].status, SubscriptionStatus::Cancelled);
    }

    #[tokio::test]
    async fn provider_failure_is_recorded_and_retried() {
        let h = Harness::new();
        let first = subscribed(&h).await;
        h.asaas.set_method_error(
            "get_subscription",
            crate::ports::GatewayError::network("timeout"),
        );
        let mut renewal = first.clone();
        renewal.provider_payment_id = "pay_renewal".to_string();
        renewal.due_date = first.due_date.checked_add_days(Days::new(30)).unwrap();
        let handler = handler(&h, Some("whtoken"));
        let body = delivery(Some("evt_5"), "PAYMENT_UPDATED", &renewal, "PENDING");

        let result = handler.handle(command(body.clone())).await;
        assert!(matches!(result, Err(WebhookError::Processing(_))));

        h.asaas.clear_errors();
        let retried = handler.handle(command(body)).await.unwrap();
        assert_eq!(retried, WebhookResult::Processed);
        assert_eq!(h.webhook_events.len(), 1);
    }

    #[tokio::test]
    async fn event_without_id_is_applied_without_ledger() {
        let h = Harness::new();
        let payment = subscribed(&h).await;

        let result = handler(&h, None)
            .handle(HandleAsaasWebhookCommand {
                token: None,
                payload: delivery(None, "PAYMENT_CONFIRMED", &payment, "CONFIRMED"),
            })
            .await
            .unwrap();

        assert_eq!(result, WebhookResult::Processed);
        assert!(h.webhook_events.is_empty());
        assert_eq!(h.store.subscriptions()[0].status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn confirmation_waits_for_a_running_cancel() {
        let h = Harness::new();
        let payment = subscribed(&h).await;
        let webhook = handler(&h, Some("whtoken"));
        let guard = h.locks.acquire(&Harness::user()).await;

        let cancel = async {
            tokio::task::yield_now().await;
            let mut sub = h.store.subscriptions()[0].clone();
            sub.cancel().unwrap();
            SubscriptionRepository::update(h.store.as_ref(), &sub, None)
                .await
                .unwrap();
            drop(guard);
        };
        let body = delivery(Some("evt_1"), "PAYMENT_CONFIRMED", &payment, "CONFIRMED");
        let (result, ()) = tokio::join!(webhook.handle(command(body)), cancel);

        assert_eq!(result.unwrap(), WebhookResult::Processed);
        assert!(h.store.subscriptions()[0].is_hard_cancelled());
        assert_eq!(h.store.payments()[0].status, PaymentStatus::Confirmed);
    }
}
