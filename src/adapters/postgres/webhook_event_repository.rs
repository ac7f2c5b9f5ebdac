//! PostgreSQL implementation of WebhookEventRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::billing::Provider;
use crate::domain::foundation::DomainError;
use crate::ports::{WebhookEventRecord, WebhookEventRepository, WebhookOutcome};

use super::{corrupt_column, query_failed};

pub struct PostgresWebhookEventRepository {
    pool: PgPool,
}

impl PostgresWebhookEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WebhookEventRow {
    provider: String,
    event_id: String,
    event_type: String,
    processed_at: DateTime<Utc>,
    outcome: String,
    error_message: Option<String>,
    payload: serde_json::Value,
}

impl TryFrom<WebhookEventRow> for WebhookEventRecord {
    type Error = DomainError;

    fn try_from(row: WebhookEventRow) -> Result<Self, Self::Error> {
        Ok(WebhookEventRecord {
            provider: row
                .provider
                .parse::<Provider>()
                .map_err(|e| corrupt_column("provider", e))?,
            event_id: row.event_id,
            event_type: row.event_type,
            processed_at: row.processed_at,
            outcome: row
                .outcome
                .parse::<WebhookOutcome>()
                .map_err(|e| corrupt_column("outcome", e))?,
            error_message: row.error_message,
            payload: row.payload,
        })
    }
}

#[async_trait]
impl WebhookEventRepository for PostgresWebhookEventRepository {
    async fn find(
        &self,
        provider: Provider,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        let row: Option<WebhookEventRow> = sqlx::query_as(
            r#"
            SELECT provider, event_id, event_type, processed_at, outcome, error_message, payload
            FROM webhook_events
            WHERE provider = $1 AND event_id = $2
            "#,
        )
        .bind(provider.as_str())
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_failed("fetch webhook event", e))?;

        row.map(WebhookEventRecord::try_from).transpose()
    }

    async fn record(&self, record: WebhookEventRecord) -> Result<(), DomainError> {
        // Only a failed attempt may be overwritten by a redelivery.
        sqlx::query(
            r#"
            INSERT INTO webhook_events (
                provider, event_id, event_type, processed_at, outcome, error_message, payload
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (provider, event_id) DO UPDATE SET
                event_type = EXCLUDED.event_type,
                processed_at = EXCLUDED.processed_at,
                outcome = EXCLUDED.outcome,
                error_message = EXCLUDED.error_message,
                payload = EXCLUDED.payload
            WHERE webhook_events.outcome = 'failed'
            "#,
        )
        .bind(record.provider.as_str())
        .bind(&record.event_id)
        .bind(&record.event_type)
        .bind(record.processed_at)
        .bind(record.outcome.as_str())
        .bind(&record.error_message)
        .bind(&record.payload)
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("record webhook event", e))?;

        Ok(())
    }
}
