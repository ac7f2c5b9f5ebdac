//! Bodies shared across routers.

use serde::Serialize;

use crate::ports::WebhookResult;

/// Acknowledgement returned to a provider for an accepted delivery.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub result: WebhookResult,
}

impl From<WebhookResult> for WebhookAck {
    fn from(result: WebhookResult) -> Self {
        Self {
            received: true,
            result,
        }
    }
}
