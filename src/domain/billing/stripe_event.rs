//! Stripe webhook event types.
//!
//! Only the fields reconciliation reads are captured; the rest of Stripe's
//! event schema is ignored.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Timestamp;

use super::SubscriptionStatus;

/// Stripe webhook event envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEvent {
    /// Unique identifier for the event (evt_xxx format).
    pub id: String,

    /// Type of event (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Time at which the event was created (Unix timestamp).
    pub created: i64,

    pub data: StripeEventData,

    #[serde(default)]
    pub livemode: bool,
}

/// Container for event-specific data.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    /// The object that triggered the event (polymorphic based on event type).
    pub object: serde_json::Value,
}

impl StripeEvent {
    /// Attempts to deserialize the data object as the specified type.
    pub fn deserialize_object<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.object.clone())
    }

    /// Parse the event type into a known enum variant.
    pub fn parsed_type(&self) -> StripeEventType {
        StripeEventType::from_str(&self.event_type)
    }
}

/// Stripe event types that drive reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripeEventType {
    CheckoutSessionCompleted,
    CustomerSubscriptionUpdated,
    CustomerSubscriptionDeleted,
    /// Anything else; acknowledged without action.
    Unknown,
}

impl StripeEventType {
    /// Parse event type from string.
    pub fn from_str(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "customer.subscription.updated" => Self::CustomerSubscriptionUpdated,
            "customer.subscription.deleted" => Self::CustomerSubscriptionDeleted,
            _ => Self::Unknown,
        }
    }

    /// Convert to the Stripe event type string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::CustomerSubscriptionUpdated => "customer.subscription.updated",
            Self::CustomerSubscriptionDeleted => "customer.subscription.deleted",
            Self::Unknown => "unknown",
        }
    }
}

/// `checkout.session.completed` payload.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
}

/// `customer.subscription.*` payload.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionObject {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
}

impl SubscriptionObject {
    pub fn canonical_status(&self) -> SubscriptionStatus {
        stripe_status_to_canonical(&self.status)
    }

    pub fn period_end(&self) -> Option<Timestamp> {
        self.current_period_end.and_then(Timestamp::from_unix_secs)
    }
}

/// Maps a Stripe subscription status onto the canonical status.
///
/// Only `active` counts as active; every other Stripe status
/// (`past_due`, `unpaid`, `canceled`, `incomplete`, ...) is treated as ended.
pub fn stripe_status_to_canonical(status: &str) -> SubscriptionStatus {
    if status == "active" {
        SubscriptionStatus::Active
    } else {
        SubscriptionStatus::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(event_type: &str, object: serde_json::Value) -> StripeEvent {
        StripeEvent {
            id: "evt_test_123".to_string(),
            event_type: event_type.to_string(),
            created: 1704067200,
            data: StripeEventData { object },
            livemode: false,
        }
    }

    #[test]
    fn deserialize_minimal_event() {
        let json = r#"{
            "id": "evt_1234567890",
            "type": "checkout.session.completed",
            "created": 1704067200,
            "data": { "object": {} },
            "livemode": false,
            "api_version": "2023-10-16"
        }"#;

        let event: StripeEvent = serde_json::from_str(json).unwrap();

        assert_eq!(event.id, "evt_1234567890");
        assert_eq!(event.parsed_type(), StripeEventType::CheckoutSessionCompleted);
    }

    #[test]
    fn checkout_session_object_reads_subscription() {
        let event = event(
            "checkout.session.completed",
            json!({"id": "cs_test_1", "subscription": "sub_1", "customer": "cus_1"}),
        );

        let session: CheckoutSessionObject = event.deserialize_object().unwrap();

        assert_eq!(session.id, "cs_test_1");
        assert_eq!(session.subscription.as_deref(), Some("sub_1"));
    }

    #[test]
    fn subscription_object_maps_status_and_period() {
        let event = event(
            "customer.subscription.updated",
            json!({
                "id": "sub_1",
                "status": "past_due",
                "current_period_end": 1706745600,
                "cancel_at_period_end": true
            }),
        );

        let sub: SubscriptionObject = event.deserialize_object().unwrap();

        assert_eq!(sub.canonical_status(), SubscriptionStatus::Cancelled);
        assert_eq!(sub.period_end().unwrap().as_unix_secs(), 1706745600);
        assert!(sub.cancel_at_period_end);
    }

    #[test]
    fn only_active_maps_to_active() {
        assert_eq!(stripe_status_to_canonical("active"), SubscriptionStatus::Active);
        for other in ["trialing", "canceled", "unpaid", "incomplete", "incomplete_expired"] {
            assert_eq!(stripe_status_to_canonical(other), SubscriptionStatus::Cancelled);
        }
    }

    #[test]
    fn event_type_as_str_roundtrip() {
        for event_type in [
            StripeEventType::CheckoutSessionCompleted,
            StripeEventType::CustomerSubscriptionUpdated,
            StripeEventType::CustomerSubscriptionDeleted,
        ] {
            assert_eq!(StripeEventType::from_str(event_type.as_str()), event_type);
        }
        assert_eq!(
            StripeEventType::from_str("invoice.paid"),
            StripeEventType::Unknown
        );
    }
}
