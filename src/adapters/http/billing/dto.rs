//! Request and response bodies for `/api/billing`.
//!
//! Request fields are optional at the serde level so a missing field is
//! reported as a validation error in the usual `{"error"}` body instead of
//! an extractor rejection.

use serde::{Deserialize, Serialize};

use crate::application::handlers::billing::{
    ChangePlanResult, CreateSubscriptionResult, PaymentStatusView, ReactivateSubscriptionResult,
};
use crate::domain::billing::{BillingError, Payment, Provider, Subscription};
use crate::domain::foundation::PlanId;
use crate::ports::ReturnUrls;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Body of `POST /subscribe`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub plan_id: Option<String>,
    /// `STRIPE` or `ASAAS`, case-insensitive.
    pub provider: Option<String>,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

impl SubscribeRequest {
    pub fn provider(&self) -> Result<Provider, BillingError> {
        let raw = self
            .provider
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| BillingError::validation("provider", "Provider is required"))?;
        raw.parse::<Provider>()
            .map_err(|_| BillingError::validation("provider", "Provider must be STRIPE or ASAAS"))
    }

    /// Both URLs or nothing; the Stripe flow rejects a missing pair.
    pub fn return_urls(&self) -> Option<ReturnUrls> {
        match (&self.success_url, &self.cancel_url) {
            (Some(success_url), Some(cancel_url)) => Some(ReturnUrls {
                success_url: success_url.clone(),
                cancel_url: cancel_url.clone(),
            }),
            _ => None,
        }
    }
}

/// Body of `POST /change-plan`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePlanRequest {
    pub plan_id: Option<String>,
}

/// Parses a required plan id. An id that is not a UUID cannot name a plan.
pub fn parse_plan_id(raw: Option<&str>) -> Result<PlanId, BillingError> {
    let raw = raw
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| BillingError::validation("planId", "Plan id is required"))?;
    raw.parse::<PlanId>()
        .map_err(|_| BillingError::plan_not_found())
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Response of `POST /subscribe`.
///
/// `url` is the Stripe checkout page; `payment` carries the Asaas PIX charge.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeResponse {
    pub provider: Provider,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub subscription: Subscription,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<Payment>,
    pub resumed: bool,
}

impl From<CreateSubscriptionResult> for SubscribeResponse {
    fn from(result: CreateSubscriptionResult) -> Self {
        Self {
            provider: result.provider,
            url: result.checkout_url,
            subscription: result.subscription,
            payment: result.payment,
            resumed: result.resumed,
        }
    }
}

/// Response of cancel, reactivate and change-plan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub subscription: Subscription,
    /// New PIX charge when the Asaas subscription was replaced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<Payment>,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(subscription: Subscription) -> Self {
        Self {
            subscription,
            payment: None,
        }
    }
}

impl From<ChangePlanResult> for SubscriptionResponse {
    fn from(result: ChangePlanResult) -> Self {
        Self {
            subscription: result.subscription,
            payment: result.payment,
        }
    }
}

impl From<ReactivateSubscriptionResult> for SubscriptionResponse {
    fn from(result: ReactivateSubscriptionResult) -> Self {
        Self {
            subscription: result.subscription,
            payment: result.payment,
        }
    }
}

/// Response of `GET /payment-status`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PaymentStatusResponse {
    NoSubscription { status: &'static str },
    Current(PaymentStatusView),
}

impl PaymentStatusResponse {
    pub fn no_subscription() -> Self {
        PaymentStatusResponse::NoSubscription {
            status: "NO_SUBSCRIPTION",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_request_reads_camel_case() {
        let request: SubscribeRequest = serde_json::from_str(
            r#"{"planId":"p","provider":"stripe","successUrl":"https://a","cancelUrl":"https://b"}"#,
        )
        .unwrap();

        assert_eq!(request.provider().unwrap(), Provider::Stripe);
        assert_eq!(request.return_urls().unwrap().cancel_url, "https://b");
    }

    #[test]
    fn missing_provider_is_validation_error() {
        let err = SubscribeRequest::default().provider().unwrap_err();
        assert!(matches!(err, BillingError::ValidationFailed { ref field, .. } if field == "provider"));
    }

    #[test]
    fn unknown_provider_is_validation_error() {
        let request = SubscribeRequest {
            provider: Some("paypal".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            request.provider(),
            Err(BillingError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn half_return_urls_are_dropped() {
        let request = SubscribeRequest {
            success_url: Some("https://a".to_string()),
            ..Default::default()
        };
        assert!(request.return_urls().is_none());
    }

    #[test]
    fn plan_id_is_required() {
        assert!(matches!(
            parse_plan_id(None),
            Err(BillingError::ValidationFailed { .. })
        ));
        assert!(matches!(
            parse_plan_id(Some("  ")),
            Err(BillingError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn malformed_plan_id_is_not_found() {
        assert_eq!(parse_plan_id(Some("basic")).unwrap_err(), BillingError::plan_not_found());
    }

    #[test]
    fn no_subscription_serializes_status_only() {
        let json = serde_json::to_value(PaymentStatusResponse::no_subscription()).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "NO_SUBSCRIPTION" }));
    }
}
