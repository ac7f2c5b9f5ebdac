//! WebhookEventRepository port - ledger of provider webhook deliveries.
//!
//! Both providers deliver at least once. Handlers are idempotent on their
//! own; the ledger lets a replay of an already handled event return early
//! and keeps the payload for auditing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::billing::Provider;
use crate::domain::foundation::DomainError;

/// How a webhook delivery was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookOutcome {
    Success,
    Ignored,
    Failed,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Success => "success",
            WebhookOutcome::Ignored => "ignored",
            WebhookOutcome::Failed => "failed",
        }
    }

    /// Whether a redelivery of this event can be skipped.
    pub fn is_final(&self) -> bool {
        !matches!(self, WebhookOutcome::Failed)
    }
}

impl std::str::FromStr for WebhookOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(WebhookOutcome::Success),
            "ignored" => Ok(WebhookOutcome::Ignored),
            "failed" => Ok(WebhookOutcome::Failed),
            other => Err(format!("unknown webhook outcome: {}", other)),
        }
    }
}

/// Record of a processed webhook event.
#[derive(Debug, Clone)]
pub struct WebhookEventRecord {
    pub provider: Provider,

    /// Provider event id (`evt_...` for Stripe, `evt_...` or absent for Asaas).
    pub event_id: String,

    /// e.g. "checkout.session.completed" or "PAYMENT_CONFIRMED".
    pub event_type: String,

    pub processed_at: DateTime<Utc>,
    pub outcome: WebhookOutcome,

    /// Reason for an ignored event or the error of a failed one.
    pub error_message: Option<String>,

    /// Original event payload for debugging.
    pub payload: serde_json::Value,
}

impl WebhookEventRecord {
    fn new(
        provider: Provider,
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        outcome: WebhookOutcome,
        error_message: Option<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            provider,
            event_id: event_id.into(),
            event_type: event_type.into(),
            processed_at: Utc::now(),
            outcome,
            error_message,
            payload,
        }
    }

    /// Creates a new success record.
    pub fn success(
        provider: Provider,
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self::new(provider, event_id, event_type, WebhookOutcome::Success, None, payload)
    }

    /// Creates a new ignored record.
    pub fn ignored(
        provider: Provider,
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        reason: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self::new(
            provider,
            event_id,
            event_type,
            WebhookOutcome::Ignored,
            Some(reason.into()),
            payload,
        )
    }

    /// Creates a new failure record.
    pub fn failed(
        provider: Provider,
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        error: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self::new(
            provider,
            event_id,
            event_type,
            WebhookOutcome::Failed,
            Some(error.into()),
            payload,
        )
    }
}

/// Port for storing and retrieving processed webhook events.
///
/// Keyed by `(provider, event_id)`.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    /// Find a previously recorded event.
    async fn find(
        &self,
        provider: Provider,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError>;

    /// Store the outcome of handling an event.
    ///
    /// A later delivery of a failed event overwrites the failure; final
    /// outcomes are never overwritten.
    async fn record(&self, record: WebhookEventRecord) -> Result<(), DomainError>;
}

/// Result of webhook processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookResult {
    /// Event was applied to local state.
    Processed,
    /// Event was acknowledged without changes.
    Ignored,
    /// Event was already processed (idempotent skip).
    AlreadyProcessed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    struct InMemoryWebhookEventRepository {
        records: Arc<RwLock<HashMap<(Provider, String), WebhookEventRecord>>>,
    }

    impl InMemoryWebhookEventRepository {
        fn new() -> Self {
            Self {
                records: Arc::new(RwLock::new(HashMap::new())),
            }
        }
    }

    #[async_trait]
    impl WebhookEventRepository for InMemoryWebhookEventRepository {
        async fn find(
            &self,
            provider: Provider,
            event_id: &str,
        ) -> Result<Option<WebhookEventRecord>, DomainError> {
            let records = self.records.read().await;
            Ok(records.get(&(provider, event_id.to_string())).cloned())
        }

        async fn record(&self, record: WebhookEventRecord) -> Result<(), DomainError> {
            let mut records = self.records.write().await;
            let key = (record.provider, record.event_id.clone());
            let keep_existing = records
                .get(&key)
                .map(|existing| existing.outcome.is_final())
                .unwrap_or(false);
            if !keep_existing {
                records.insert(key, record);
            }
            Ok(())
        }
    }

    // ══════════════════════════════════════════════════════════════
    // WebhookEventRecord Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn success_record_has_correct_fields() {
        let record = WebhookEventRecord::success(
            Provider::Stripe,
            "evt_123",
            "checkout.session.completed",
            serde_json::json!({"id": "test"}),
        );

        assert_eq!(record.event_id, "evt_123");
        assert_eq!(record.outcome, WebhookOutcome::Success);
        assert!(record.error_message.is_none());
    }

    #[test]
    fn ignored_record_includes_reason() {
        let record = WebhookEventRecord::ignored(
            Provider::Asaas,
            "evt_456",
            "PAYMENT_CREATED",
            "Event type not handled",
            serde_json::json!({}),
        );

        assert_eq!(record.outcome, WebhookOutcome::Ignored);
        assert_eq!(record.error_message.as_deref(), Some("Event type not handled"));
    }

    #[test]
    fn only_failed_outcome_is_retryable() {
        assert!(WebhookOutcome::Success.is_final());
        assert!(WebhookOutcome::Ignored.is_final());
        assert!(!WebhookOutcome::Failed.is_final());
    }

    #[test]
    fn outcome_round_trips_through_str() {
        for outcome in [WebhookOutcome::Success, WebhookOutcome::Ignored, WebhookOutcome::Failed] {
            assert_eq!(outcome.as_str().parse::<WebhookOutcome>().unwrap(), outcome);
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Repository Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn failed_event_is_overwritten_by_later_success() {
        let repo = InMemoryWebhookEventRepository::new();
        repo.record(WebhookEventRecord::failed(
            Provider::Stripe,
            "evt_1",
            "customer.subscription.updated",
            "db down",
            serde_json::json!({}),
        ))
        .await
        .unwrap();
        repo.record(WebhookEventRecord::success(
            Provider::Stripe,
            "evt_1",
            "customer.subscription.updated",
            serde_json::json!({}),
        ))
        .await
        .unwrap();

        let found = repo.find(Provider::Stripe, "evt_1").await.unwrap().unwrap();
        assert_eq!(found.outcome, WebhookOutcome::Success);
    }

    #[tokio::test]
    async fn same_event_id_is_scoped_per_provider() {
        let repo = InMemoryWebhookEventRepository::new();
        repo.record(WebhookEventRecord::success(
            Provider::Asaas,
            "evt_1",
            "PAYMENT_CONFIRMED",
            serde_json::json!({}),
        ))
        .await
        .unwrap();

        assert!(repo.find(Provider::Stripe, "evt_1").await.unwrap().is_none());
        assert!(repo.find(Provider::Asaas, "evt_1").await.unwrap().is_some());
    }
}
