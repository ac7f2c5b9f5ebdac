//! Webhook delivery ledger.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::billing::Provider;
use crate::domain::foundation::DomainError;
use crate::ports::{WebhookEventRecord, WebhookEventRepository};

/// In-memory webhook ledger keyed by `(provider, event_id)`.
#[derive(Default)]
pub struct InMemoryWebhookEventRepository {
    records: RwLock<HashMap<(Provider, String), WebhookEventRecord>>,
}

impl InMemoryWebhookEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .expect("InMemoryWebhookEventRepository: lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl WebhookEventRepository for InMemoryWebhookEventRepository {
    async fn find(
        &self,
        provider: Provider,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        let records = self
            .records
            .read()
            .expect("InMemoryWebhookEventRepository: lock poisoned");
        Ok(records.get(&(provider, event_id.to_string())).cloned())
    }

    async fn record(&self, record: WebhookEventRecord) -> Result<(), DomainError> {
        let mut records = self
            .records
            .write()
            .expect("InMemoryWebhookEventRepository: lock poisoned");
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
