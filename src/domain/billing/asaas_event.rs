//! Asaas webhook payloads.
//!
//! Asaas posts JSON like:
//!
//! ```json
//! { "id": "evt_...", "event": "PAYMENT_CONFIRMED",
//!   "payment": { "id": "pay_...", "subscription": "sub_...", "status": "CONFIRMED", ... } }
//! ```
//!
//! Only payment-status events are reconciled; everything else is
//! acknowledged and dropped.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{BillingType, PaymentStatus};

/// Payment events that carry a status change worth mirroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AsaasEventType {
    PaymentReceived,
    PaymentConfirmed,
    PaymentUpdated,
    PaymentOverdue,
    PaymentDeleted,
    PaymentRestored,
    PaymentRefunded,
    PaymentReceivedInCashUndone,
    PaymentChargebackRequested,
    PaymentChargebackDispute,
    PaymentAwaitingChargebackReversal,
}

impl AsaasEventType {
    /// Parses an event name, returning `None` for anything off the allow-list.
    pub fn parse(event: &str) -> Option<Self> {
        match event {
            "PAYMENT_RECEIVED" => Some(Self::PaymentReceived),
            "PAYMENT_CONFIRMED" => Some(Self::PaymentConfirmed),
            "PAYMENT_UPDATED" => Some(Self::PaymentUpdated),
            "PAYMENT_OVERDUE" => Some(Self::PaymentOverdue),
            "PAYMENT_DELETED" => Some(Self::PaymentDeleted),
            "PAYMENT_RESTORED" => Some(Self::PaymentRestored),
            "PAYMENT_REFUNDED" => Some(Self::PaymentRefunded),
            "PAYMENT_RECEIVED_IN_CASH_UNDONE" => Some(Self::PaymentReceivedInCashUndone),
            "PAYMENT_CHARGEBACK_REQUESTED" => Some(Self::PaymentChargebackRequested),
            "PAYMENT_CHARGEBACK_DISPUTE" => Some(Self::PaymentChargebackDispute),
            "PAYMENT_AWAITING_CHARGEBACK_REVERSAL" => {
                Some(Self::PaymentAwaitingChargebackReversal)
            }
            _ => None,
        }
    }

    /// The charge can no longer be paid, so its QR code is stale.
    pub fn clears_pix(&self) -> bool {
        matches!(self, Self::PaymentDeleted | Self::PaymentRefunded)
    }
}

/// Webhook envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AsaasWebhookEvent {
    /// Event id; older API versions omit it.
    #[serde(default)]
    pub id: Option<String>,

    pub event: String,

    /// Present on payment events only.
    #[serde(default)]
    pub payment: Option<AsaasPaymentPayload>,
}

/// Payment object embedded in payment events.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AsaasPaymentPayload {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
    pub value: f64,
    pub status: PaymentStatus,
    pub billing_type: BillingType,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub invoice_url: Option<String>,
}

impl AsaasWebhookEvent {
    /// The allow-listed event type, if any.
    pub fn event_type(&self) -> Option<AsaasEventType> {
        AsaasEventType::parse(&self.event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIRMED: &str = r#"{
        "id": "evt_05b708f961d739ea7eba7e4db318f621&368604920",
        "event": "PAYMENT_CONFIRMED",
        "dateCreated": "2024-06-12 16:45:03",
        "payment": {
            "object": "payment",
            "id": "pay_080225913252",
            "customer": "cus_G7Dvo4iphUNk",
            "subscription": "sub_VXJBYgP2u0eO",
            "value": 19.9,
            "netValue": 19.4,
            "billingType": "PIX",
            "status": "CONFIRMED",
            "dueDate": "2024-06-13",
            "invoiceUrl": "https://www.asaas.com/i/080225913252"
        }
    }"#;

    #[test]
    fn parses_payment_event() {
        let event: AsaasWebhookEvent = serde_json::from_str(CONFIRMED).unwrap();

        assert_eq!(event.event_type(), Some(AsaasEventType::PaymentConfirmed));
        let payment = event.payment.unwrap();
        assert_eq!(payment.id, "pay_080225913252");
        assert_eq!(payment.subscription.as_deref(), Some("sub_VXJBYgP2u0eO"));
        assert_eq!(payment.status, PaymentStatus::Confirmed);
        assert_eq!(payment.billing_type, BillingType::Pix);
        assert_eq!(payment.due_date, NaiveDate::from_ymd_opt(2024, 6, 13).unwrap());
    }

    #[test]
    fn unknown_events_are_off_the_allow_list() {
        assert_eq!(AsaasEventType::parse("SUBSCRIPTION_CREATED"), None);
        assert_eq!(AsaasEventType::parse("PAYMENT_CREATED"), None);
    }

    #[test]
    fn chargeback_variants_are_allowed() {
        assert!(AsaasEventType::parse("PAYMENT_CHARGEBACK_REQUESTED").is_some());
        assert!(AsaasEventType::parse("PAYMENT_CHARGEBACK_DISPUTE").is_some());
        assert!(AsaasEventType::parse("PAYMENT_AWAITING_CHARGEBACK_REVERSAL").is_some());
        assert!(AsaasEventType::parse("PAYMENT_RECEIVED_IN_CASH_UNDONE").is_some());
    }

    #[test]
    fn only_deleted_and_refunded_clear_pix() {
        assert!(AsaasEventType::PaymentDeleted.clears_pix());
        assert!(AsaasEventType::PaymentRefunded.clears_pix());
        assert!(!AsaasEventType::PaymentConfirmed.clears_pix());
        assert!(!AsaasEventType::PaymentOverdue.clears_pix());
    }

    #[test]
    fn non_payment_events_parse_without_payment() {
        let event: AsaasWebhookEvent =
            serde_json::from_str(r#"{"event": "SUBSCRIPTION_DELETED"}"#).unwrap();
        assert!(event.payment.is_none());
        assert!(event.event_type().is_none());
    }
}
