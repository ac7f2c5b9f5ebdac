//! Asaas payments and their cached PIX charge.
//!
//! Stripe invoices are read live from Stripe and never stored, so only
//! Asaas charges have a local record.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{Money, PaymentId, SubscriptionId, Timestamp};

/// Asaas payment status.
///
/// Unknown values are kept verbatim so a new provider status never fails
/// deserialization or gets lost on write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentStatus {
    Pending,
    Received,
    Confirmed,
    Overdue,
    Refunded,
    ReceivedInCash,
    RefundRequested,
    RefundInProgress,
    ChargebackRequested,
    ChargebackDispute,
    AwaitingChargebackReversal,
    DunningRequested,
    DunningReceived,
    AwaitingRiskAnalysis,
    Other(String),
}

impl PaymentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Received => "RECEIVED",
            PaymentStatus::Confirmed => "CONFIRMED",
            PaymentStatus::Overdue => "OVERDUE",
            PaymentStatus::Refunded => "REFUNDED",
            PaymentStatus::ReceivedInCash => "RECEIVED_IN_CASH",
            PaymentStatus::RefundRequested => "REFUND_REQUESTED",
            PaymentStatus::RefundInProgress => "REFUND_IN_PROGRESS",
            PaymentStatus::ChargebackRequested => "CHARGEBACK_REQUESTED",
            PaymentStatus::ChargebackDispute => "CHARGEBACK_DISPUTE",
            PaymentStatus::AwaitingChargebackReversal => "AWAITING_CHARGEBACK_REVERSAL",
            PaymentStatus::DunningRequested => "DUNNING_REQUESTED",
            PaymentStatus::DunningReceived => "DUNNING_RECEIVED",
            PaymentStatus::AwaitingRiskAnalysis => "AWAITING_RISK_ANALYSIS",
            PaymentStatus::Other(s) => s,
        }
    }

    /// Money has reached us.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Received | PaymentStatus::Confirmed | PaymentStatus::ReceivedInCash
        )
    }
}

impl From<String> for PaymentStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "PENDING" => PaymentStatus::Pending,
            "RECEIVED" => PaymentStatus::Received,
            "CONFIRMED" => PaymentStatus::Confirmed,
            "OVERDUE" => PaymentStatus::Overdue,
            "REFUNDED" => PaymentStatus::Refunded,
            "RECEIVED_IN_CASH" => PaymentStatus::ReceivedInCash,
            "REFUND_REQUESTED" => PaymentStatus::RefundRequested,
            "REFUND_IN_PROGRESS" => PaymentStatus::RefundInProgress,
            "CHARGEBACK_REQUESTED" => PaymentStatus::ChargebackRequested,
            "CHARGEBACK_DISPUTE" => PaymentStatus::ChargebackDispute,
            "AWAITING_CHARGEBACK_REVERSAL" => PaymentStatus::AwaitingChargebackReversal,
            "DUNNING_REQUESTED" => PaymentStatus::DunningRequested,
            "DUNNING_RECEIVED" => PaymentStatus::DunningReceived,
            "AWAITING_RISK_ANALYSIS" => PaymentStatus::AwaitingRiskAnalysis,
            _ => PaymentStatus::Other(s),
        }
    }
}

impl From<&str> for PaymentStatus {
    fn from(s: &str) -> Self {
        PaymentStatus::from(s.to_string())
    }
}

impl From<PaymentStatus> for String {
    fn from(status: PaymentStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the charge is paid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BillingType {
    Pix,
    Boleto,
    CreditCard,
    Undefined,
    Other(String),
}

impl BillingType {
    pub fn as_str(&self) -> &str {
        match self {
            BillingType::Pix => "PIX",
            BillingType::Boleto => "BOLETO",
            BillingType::CreditCard => "CREDIT_CARD",
            BillingType::Undefined => "UNDEFINED",
            BillingType::Other(s) => s,
        }
    }
}

impl From<String> for BillingType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "PIX" => BillingType::Pix,
            "BOLETO" => BillingType::Boleto,
            "CREDIT_CARD" => BillingType::CreditCard,
            "UNDEFINED" => BillingType::Undefined,
            _ => BillingType::Other(s),
        }
    }
}

impl From<BillingType> for String {
    fn from(billing_type: BillingType) -> Self {
        billing_type.as_str().to_string()
    }
}

/// Redeemable PIX data for one charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixCharge {
    /// Base64 PNG of the QR code.
    pub qr_code_image: String,
    /// "Copia e cola" payload.
    pub copy_paste_key: String,
}

/// A charge materialized by Asaas for a subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: PaymentId,
    pub provider_payment_id: String,
    pub subscription_id: SubscriptionId,

    /// Provider subscription that generated the charge. Changes when an
    /// Asaas plan change or reactivation replaces the provider subscription.
    pub provider_subscription_id: String,

    pub provider_customer_id: String,
    pub value: Money,
    pub status: PaymentStatus,
    pub billing_type: BillingType,
    pub due_date: NaiveDate,
    pub invoice_url: Option<String>,
    pub pix: Option<PixCharge>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Payment {
    /// Records a charge reported by the provider.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        provider_payment_id: impl Into<String>,
        subscription_id: SubscriptionId,
        provider_subscription_id: impl Into<String>,
        provider_customer_id: impl Into<String>,
        value: Money,
        status: PaymentStatus,
        billing_type: BillingType,
        due_date: NaiveDate,
        invoice_url: Option<String>,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: PaymentId::new(),
            provider_payment_id: provider_payment_id.into(),
            subscription_id,
            provider_subscription_id: provider_subscription_id.into(),
            provider_customer_id: provider_customer_id.into(),
            value,
            status,
            billing_type,
            due_date,
            invoice_url,
            pix: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_pix(mut self, pix: Option<PixCharge>) -> Self {
        self.pix = pix;
        self
    }

    pub fn is_pix(&self) -> bool {
        self.billing_type == BillingType::Pix
    }

    /// A PIX charge still waiting to be paid, whose QR may be regenerated.
    pub fn awaits_pix_payment(&self) -> bool {
        self.is_pix() && self.status == PaymentStatus::Pending
    }

    /// Last-write-wins status update.
    pub fn update_status(&mut self, status: PaymentStatus) {
        if self.status != status {
            self.status = status;
            self.updated_at = Timestamp::now();
        }
    }

    /// Replaces the cached QR, keeping the old one when the provider returned none.
    pub fn refresh_pix(&mut self, pix: Option<PixCharge>) {
        if let Some(pix) = pix {
            if self.pix.as_ref() != Some(&pix) {
                self.pix = Some(pix);
                self.updated_at = Timestamp::now();
            }
        }
    }

    /// Drops the cached QR once it can no longer be redeemed.
    pub fn clear_pix(&mut self) {
        if self.pix.is_some() {
            self.pix = None;
            self.updated_at = Timestamp::now();
        }
    }
}

/// Picks the first charge of a provider subscription: earliest due date,
/// ties by creation. Charges of replaced provider subscriptions are skipped.
pub fn first_payment<'a>(
    payments: &'a [Payment],
    provider_subscription_id: &str,
) -> Option<&'a Payment> {
    payments
        .iter()
        .filter(|p| p.provider_subscription_id == provider_subscription_id)
        .min_by(|a, b| a.due_date.cmp(&b.due_date).then(a.created_at.cmp(&b.created_at)))
}
