//! Asaas gateway port.
//!
//! Asaas has no in-place plan change and no undo for a deleted
//! subscription, so the billing flows only ever create, read and delete.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::billing::{BillingInterval, BillingType, PaymentStatus, PixCharge};
use crate::domain::foundation::Money;

use super::GatewayError;

/// Request to create an Asaas customer.
#[derive(Debug, Clone)]
pub struct CreateAsaasCustomer {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub cpf_cnpj: String,
}

/// Request to create a PIX subscription.
#[derive(Debug, Clone)]
pub struct CreateAsaasSubscription {
    pub customer_id: String,
    pub value: Money,
    pub next_due_date: NaiveDate,
    pub cycle: BillingInterval,
    pub description: Option<String>,
}

/// Provider-side subscription statuses.
pub mod asaas_status {
    pub const ACTIVE: &str = "ACTIVE";
    pub const INACTIVE: &str = "INACTIVE";
    pub const EXPIRED: &str = "EXPIRED";
}

/// An Asaas subscription as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsaasSubscriptionInfo {
    pub id: String,
    pub customer_id: String,
    pub status: String,
    pub value: Money,
    pub cycle: Option<BillingInterval>,
    pub next_due_date: Option<NaiveDate>,
    pub deleted: bool,
}

impl AsaasSubscriptionInfo {
    /// The provider will not charge this subscription again.
    pub fn is_terminated(&self) -> bool {
        self.deleted
            || self.status == asaas_status::INACTIVE
            || self.status == asaas_status::EXPIRED
    }
}

/// An Asaas payment (charge) as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsaasPaymentInfo {
    pub id: String,
    pub customer_id: String,
    pub subscription_id: Option<String>,
    pub value: Money,
    pub status: PaymentStatus,
    pub billing_type: BillingType,
    pub due_date: NaiveDate,
    pub invoice_url: Option<String>,
}

/// Port for the Asaas API.
#[async_trait]
pub trait AsaasGateway: Send + Sync {
    /// Create a customer with notifications disabled. Returns the customer id.
    async fn create_customer(&self, request: CreateAsaasCustomer) -> Result<String, GatewayError>;

    /// Create a PIX subscription.
    async fn create_subscription(
        &self,
        request: CreateAsaasSubscription,
    ) -> Result<AsaasSubscriptionInfo, GatewayError>;

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<AsaasSubscriptionInfo, GatewayError>;

    /// Delete a subscription. Deleting an already deleted one succeeds.
    async fn delete_subscription(&self, subscription_id: &str) -> Result<(), GatewayError>;

    /// Payments generated for a subscription, in provider order.
    async fn list_subscription_payments(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<AsaasPaymentInfo>, GatewayError>;

    async fn get_payment(&self, payment_id: &str) -> Result<AsaasPaymentInfo, GatewayError>;

    /// Current QR code and copy-paste key for a PIX charge.
    async fn get_pix_qr_code(&self, payment_id: &str) -> Result<PixCharge, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(status: &str, deleted: bool) -> AsaasSubscriptionInfo {
        AsaasSubscriptionInfo {
            id: "sub_1".to_string(),
            customer_id: "cus_1".to_string(),
            status: status.to_string(),
            value: Money::from_cents(2990).unwrap(),
            cycle: Some(BillingInterval::Month),
            next_due_date: None,
            deleted,
        }
    }

    #[test]
    fn terminated_when_inactive_expired_or_deleted() {
        assert!(!info(asaas_status::ACTIVE, false).is_terminated());
        assert!(info(asaas_status::INACTIVE, false).is_terminated());
        assert!(info(asaas_status::EXPIRED, false).is_terminated());
        assert!(info(asaas_status::ACTIVE, true).is_terminated());
    }

    #[test]
    fn asaas_gateway_is_object_safe() {
        fn _accepts_dyn(_gateway: &dyn AsaasGateway) {}
    }
}
