//! Ledger bookkeeping shared by both webhook handlers.

use tracing::{error, warn};

use crate::domain::billing::{BillingError, Provider, WebhookError};
use crate::ports::{WebhookEventRecord, WebhookEventRepository, WebhookResult};

/// Errors that a redelivery cannot fix. They are acknowledged so the
/// provider stops retrying.
pub(crate) fn is_unactionable(err: &BillingError) -> bool {
    matches!(
        err,
        BillingError::Inconsistency(_)
            | BillingError::NotFound { .. }
            | BillingError::Conflict(_)
            | BillingError::ValidationFailed { .. }
    )
}

/// True when the event was already handled to a final outcome.
pub(crate) async fn already_handled(
    events: &dyn WebhookEventRepository,
    provider: Provider,
    event_id: &str,
) -> Result<bool, WebhookError> {
    let existing = events
        .find(provider, event_id)
        .await
        .map_err(|e| WebhookError::Database(e.to_string()))?;
    Ok(existing.map(|record| record.outcome.is_final()).unwrap_or(false))
}

pub(crate) async fn record(
    events: &dyn WebhookEventRepository,
    record: WebhookEventRecord,
) -> Result<(), WebhookError> {
    events
        .record(record)
        .await
        .map_err(|e| WebhookError::Database(e.to_string()))
}

/// Turns the result of applying an event into the webhook response and the
/// ledger entry describing it.
pub(crate) fn settle(
    provider: Provider,
    event_id: &str,
    event_type: &str,
    payload: serde_json::Value,
    applied: Result<(), BillingError>,
) -> (WebhookEventRecord, Result<WebhookResult, WebhookError>) {
    match applied {
        Ok(()) => (
            WebhookEventRecord::success(provider, event_id, event_type, payload),
            Ok(WebhookResult::Processed),
        ),
        Err(err) if is_unactionable(&err) => {
            warn!(
                provider = %provider,
                event_id,
                event_type,
                reason = %err.detail(),
                "Webhook acknowledged without changes"
            );
            (
                WebhookEventRecord::ignored(provider, event_id, event_type, err.detail(), payload),
                Ok(WebhookResult::Ignored),
            )
        }
        Err(err) => {
            error!(
                provider = %provider,
                event_id,
                event_type,
                error = %err.detail(),
                "Webhook processing failed"
            );
            (
                WebhookEventRecord::failed(provider, event_id, event_type, err.detail(), payload),
                Err(WebhookError::Processing(err.detail())),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::WebhookOutcome;

    #[test]
    fn inconsistency_is_acknowledged() {
        let (record, result) = settle(
            Provider::Asaas,
            "evt_1",
            "PAYMENT_CONFIRMED",
            serde_json::json!({}),
            Err(BillingError::inconsistency("unknown subscription")),
        );

        assert_eq!(result.unwrap(), WebhookResult::Ignored);
        assert_eq!(record.outcome, WebhookOutcome::Ignored);
    }

    #[test]
    fn provider_failure_asks_for_redelivery() {
        let (record, result) = settle(
            Provider::Stripe,
            "evt_1",
            "checkout.session.completed",
            serde_json::json!({}),
            Err(BillingError::provider(Provider::Stripe, "HTTP 503")),
        );

        assert!(matches!(result, Err(WebhookError::Processing(_))));
        assert_eq!(record.outcome, WebhookOutcome::Failed);
    }

    #[test]
    fn stale_write_asks_for_redelivery() {
        let stale: BillingError = crate::domain::foundation::DomainError::new(
            crate::domain::foundation::ErrorCode::ConcurrentModification,
            "subscription changed underneath",
        )
        .into();

        let (record, result) = settle(
            Provider::Stripe,
            "evt_1",
            "customer.subscription.updated",
            serde_json::json!({}),
            Err(stale),
        );

        assert!(matches!(result, Err(WebhookError::Processing(_))));
        assert_eq!(record.outcome, WebhookOutcome::Failed);
    }
}
