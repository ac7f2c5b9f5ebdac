//! GetPaymentHandler - one Asaas charge with its PIX code.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::billing::{BillingError, Payment, Provider};
use crate::domain::foundation::UserId;
use crate::ports::{AsaasGateway, GatewayErrorCode, PaymentRepository};

#[derive(Debug, Clone)]
pub struct GetPaymentQuery {
    pub user_id: UserId,
    /// Asaas payment id (`pay_...`).
    pub payment_id: String,
}

/// Handler for reading a single payment.
///
/// Only payments that belong to the caller are visible. Status and the QR
/// code are refreshed from Asaas; when Asaas has no QR to give the cached
/// one is kept.
pub struct GetPaymentHandler {
    payments: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn AsaasGateway>,
}

impl GetPaymentHandler {
    pub fn new(payments: Arc<dyn PaymentRepository>, gateway: Arc<dyn AsaasGateway>) -> Self {
        Self { payments, gateway }
    }

    pub async fn handle(&self, query: GetPaymentQuery) -> Result<Payment, BillingError> {
        // 1. Scope to the caller
        let mut payment = self
            .payments
            .find_for_user(&query.user_id, &query.payment_id)
            .await?
            .ok_or_else(|| BillingError::not_found("payment", "Payment not found"))?;
        let before = payment.clone();

        // 2. Current status from Asaas
        let info = self
            .gateway
            .get_payment(&payment.provider_payment_id)
            .await
            .map_err(|e| e.into_billing(Provider::Asaas))?;
        payment.update_status(info.status);
        if info.invoice_url.is_some() {
            payment.invoice_url = info.invoice_url;
        }

        // 3. QR code while unpaid
        if payment.awaits_pix_payment() {
            match self.gateway.get_pix_qr_code(&payment.provider_payment_id).await {
                Ok(pix) => payment.refresh_pix(Some(pix)),
                Err(err) if err.code == GatewayErrorCode::NotFound => {
                    debug!(payment_id = %payment.provider_payment_id, "No QR code available; keeping cached");
                }
                Err(err) => {
                    warn!(
                        payment_id = %payment.provider_payment_id,
                        error = %err,
                        "QR code refresh failed; keeping cached"
                    );
                }
            }
        }

        // 4. Store changes
        if payment != before {
            self.payments.update(&payment).await?;
        }

        Ok(payment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::billing::test_support::Harness;
    use crate::domain::billing::PaymentStatus;
    use crate::ports::GatewayError;

    fn handler(h: &Harness) -> GetPaymentHandler {
        GetPaymentHandler::new(h.store.clone(), h.asaas.clone())
    }

    async fn first_payment(h: &Harness) -> Payment {
        h.subscribe(Provider::Asaas, &h.pro)
            .await
            .payment
            .expect("first payment")
    }

    #[tokio::test]
    async fn other_users_payment_is_not_found() {
        let h = Harness::new();
        let payment = first_payment(&h).await;

        let result = handler(&h)
            .handle(GetPaymentQuery {
                user_id: UserId::new("someone-else").unwrap(),
                payment_id: payment.provider_payment_id,
            })
            .await;

        assert!(matches!(result, Err(BillingError::NotFound { .. })));
    }

    #[tokio::test]
    async fn pending_payment_gets_fresh_qr() {
        let h = Harness::new();
        let payment = first_payment(&h).await;

        let fetched = handler(&h)
            .handle(GetPaymentQuery {
                user_id: Harness::user(),
                payment_id: payment.provider_payment_id.clone(),
            })
            .await
            .unwrap();

        assert_eq!(fetched.status, PaymentStatus::Pending);
        assert!(fetched.invoice_url.is_some());
        assert_ne!(fetched.pix, payment.pix);
        assert_eq!(h.store.payments()[0].pix, fetched.pix);
    }

    #[tokio::test]
    async fn qr_failure_keeps_cached_code() {
        let h = Harness::new();
        let payment = first_payment(&h).await;
        h.asaas
            .set_method_error("get_pix_qr_code", GatewayError::not_found("pixQrCode"));

        let fetched = handler(&h)
            .handle(GetPaymentQuery {
                user_id: Harness::user(),
                payment_id: payment.provider_payment_id.clone(),
            })
            .await
            .unwrap();

        assert_eq!(fetched.pix, payment.pix);
    }

    #[tokio::test]
    async fn received_payment_status_is_stored() {
        let h = Harness::new();
        let payment = first_payment(&h).await;
        h.asaas
            .set_payment_status(&payment.provider_payment_id, PaymentStatus::Received);

        let fetched = handler(&h)
            .handle(GetPaymentQuery {
                user_id: Harness::user(),
                payment_id: payment.provider_payment_id.clone(),
            })
            .await
            .unwrap();

        assert_eq!(fetched.status, PaymentStatus::Received);
        assert_eq!(h.store.payments()[0].status, PaymentStatus::Received);
        assert_eq!(fetched.pix, payment.pix);
    }
}
