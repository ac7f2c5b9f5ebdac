//! Provider customer links.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Timestamp, UserId};

use super::Provider;

/// Maps a user to their customer record at one provider.
///
/// Created lazily on the first subscribe attempt and never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerLink {
    pub user_id: UserId,
    pub provider: Provider,
    pub provider_customer_id: String,
    pub created_at: Timestamp,
}

impl CustomerLink {
    pub fn new(user_id: UserId, provider: Provider, provider_customer_id: impl Into<String>) -> Self {
        Self {
            user_id,
            provider,
            provider_customer_id: provider_customer_id.into(),
            created_at: Timestamp::now(),
        }
    }
}
