//! In-memory Asaas for tests.
//!
//! Creating a subscription generates its first PIX charge the way Asaas
//! does. Every QR fetch returns a new code, which lets tests tell a cached
//! QR from a refreshed one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::billing::{BillingType, PaymentStatus, PixCharge};
use crate::ports::{
    asaas_status, AsaasGateway, AsaasPaymentInfo, AsaasSubscriptionInfo, CreateAsaasCustomer,
    CreateAsaasSubscription, GatewayError,
};

/// Mock Asaas gateway.
#[derive(Clone)]
pub struct MockAsaasGateway {
    inner: Arc<Mutex<MockState>>,
}

struct MockState {
    next_id: u32,
    generate_payments: bool,
    customers: Vec<CreateAsaasCustomer>,
    subscriptions: HashMap<String, AsaasSubscriptionInfo>,
    payments: Vec<AsaasPaymentInfo>,
    method_errors: HashMap<String, GatewayError>,
    call_log: Vec<String>,
}

impl MockState {
    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}_{}", prefix, self.next_id)
    }
}

impl Default for MockAsaasGateway {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockState {
                next_id: 0,
                generate_payments: true,
                customers: Vec::new(),
                subscriptions: HashMap::new(),
                payments: Vec::new(),
                method_errors: HashMap::new(),
                call_log: Vec::new(),
            })),
        }
    }
}

impl MockAsaasGateway {
    pub fn new() -> Self {
        Self::default()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Provider-side actions
    // ════════════════════════════════════════════════════════════════════════════

    /// Whether new subscriptions come with their first charge.
    pub fn generate_payments(&self, enabled: bool) {
        self.inner.lock().unwrap().generate_payments = enabled;
    }

    pub fn set_payment_status(&self, payment_id: &str, status: PaymentStatus) {
        let mut state = self.inner.lock().unwrap();
        if let Some(payment) = state.payments.iter_mut().find(|p| p.id == payment_id) {
            payment.status = status;
        }
    }

    /// Adds a charge, e.g. a renewal the provider generated on its own.
    pub fn add_payment(&self, payment: AsaasPaymentInfo) {
        self.inner.lock().unwrap().payments.push(payment);
    }

    pub fn add_subscription(&self, info: AsaasSubscriptionInfo) {
        self.inner
            .lock()
            .unwrap()
            .subscriptions
            .insert(info.id.clone(), info);
    }

    pub fn set_subscription_status(&self, subscription_id: &str, status: &str) {
        if let Some(info) = self
            .inner
            .lock()
            .unwrap()
            .subscriptions
            .get_mut(subscription_id)
        {
            info.status = status.to_string();
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Inspection
    // ════════════════════════════════════════════════════════════════════════════

    pub fn subscription(&self, subscription_id: &str) -> Option<AsaasSubscriptionInfo> {
        self.inner
            .lock()
            .unwrap()
            .subscriptions
            .get(subscription_id)
            .cloned()
    }

    /// Subscriptions that have not been deleted.
    pub fn live_subscriptions(&self) -> Vec<AsaasSubscriptionInfo> {
        self.inner
            .lock()
            .unwrap()
            .subscriptions
            .values()
            .filter(|s| !s.deleted)
            .cloned()
            .collect()
    }

    pub fn payment(&self, payment_id: &str) -> Option<AsaasPaymentInfo> {
        let state = self.inner.lock().unwrap();
        state.payments.iter().find(|p| p.id == payment_id).cloned()
    }

    pub fn last_customer_tax_id(&self) -> Option<String> {
        let state = self.inner.lock().unwrap();
        state.customers.last().map(|c| c.cpf_cnpj.clone())
    }

    /// Set an error for a specific method.
    pub fn set_method_error(&self, method: &str, error: GatewayError) {
        self.inner
            .lock()
            .unwrap()
            .method_errors
            .insert(method.to_string(), error);
    }

    pub fn clear_errors(&self) {
        self.inner.lock().unwrap().method_errors.clear();
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.call_count(method) > 0
    }

    pub fn call_count(&self, method: &str) -> usize {
        let state = self.inner.lock().unwrap();
        state.call_log.iter().filter(|m| *m == method).count()
    }

    fn record_call(&self, method: &str) -> Result<(), GatewayError> {
        let mut state = self.inner.lock().unwrap();
        state.call_log.push(method.to_string());
        match state.method_errors.get(method) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AsaasGateway for MockAsaasGateway {
    async fn create_customer(&self, request: CreateAsaasCustomer) -> Result<String, GatewayError> {
        self.record_call("create_customer")?;
        let mut state = self.inner.lock().unwrap();
        let id = state.next("cus_asaas");
        state.customers.push(request);
        Ok(id)
    }

    async fn create_subscription(
        &self,
        request: CreateAsaasSubscription,
    ) -> Result<AsaasSubscriptionInfo, GatewayError> {
        self.record_call("create_subscription")?;
        let mut state = self.inner.lock().unwrap();
        let info = AsaasSubscriptionInfo {
            id: state.next("sub_asaas"),
            customer_id: request.customer_id.clone(),
            status: asaas_status::ACTIVE.to_string(),
            value: request.value,
            cycle: Some(request.cycle),
            next_due_date: Some(request.next_due_date),
            deleted: false,
        };
        if state.generate_payments {
            let payment_id = state.next("pay");
            let payment = AsaasPaymentInfo {
                invoice_url: Some(format!("https://sandbox.asaas.com/i/{}", payment_id)),
                id: payment_id,
                customer_id: request.customer_id,
                subscription_id: Some(info.id.clone()),
                value: request.value,
                status: PaymentStatus::Pending,
                billing_type: BillingType::Pix,
                due_date: request.next_due_date,
            };
            state.payments.push(payment);
        }
        state.subscriptions.insert(info.id.clone(), info.clone());
        Ok(info)
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<AsaasSubscriptionInfo, GatewayError> {
        self.record_call("get_subscription")?;
        self.subscription(subscription_id)
            .ok_or_else(|| GatewayError::not_found("subscription"))
    }

    async fn delete_subscription(&self, subscription_id: &str) -> Result<(), GatewayError> {
        self.record_call("delete_subscription")?;
        let mut state = self.inner.lock().unwrap();
        let info = state
            .subscriptions
            .get_mut(subscription_id)
            .ok_or_else(|| GatewayError::not_found("subscription"))?;
        info.deleted = true;
        info.status = asaas_status::INACTIVE.to_string();
        Ok(())
    }

    async fn list_subscription_payments(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<AsaasPaymentInfo>, GatewayError> {
        self.record_call("list_subscription_payments")?;
        let state = self.inner.lock().unwrap();
        Ok(state
            .payments
            .iter()
            .filter(|p| p.subscription_id.as_deref() == Some(subscription_id))
            .cloned()
            .collect())
    }

    async fn get_payment(&self, payment_id: &str) -> Result<AsaasPaymentInfo, GatewayError> {
        self.record_call("get_payment")?;
        self.payment(payment_id)
            .ok_or_else(|| GatewayError::not_found("payment"))
    }

    async fn get_pix_qr_code(&self, payment_id: &str) -> Result<PixCharge, GatewayError> {
        self.record_call("get_pix_qr_code")?;
        let mut state = self.inner.lock().unwrap();
        if !state.payments.iter().any(|p| p.id == payment_id) {
            return Err(GatewayError::not_found("payment"));
        }
        state.next_id += 1;
        let n = state.next_id;
        Ok(PixCharge {
            qr_code_image: format!("qr-{}-{}", payment_id, n),
            copy_paste_key: format!("pix-{}-{}", payment_id, n),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::BillingInterval;
    use crate::domain::foundation::Money;
    use chrono::NaiveDate;

    fn request() -> CreateAsaasSubscription {
        CreateAsaasSubscription {
            customer_id: "cus_1".to_string(),
            value: Money::from_cents(2990).unwrap(),
            next_due_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            cycle: BillingInterval::Month,
            description: None,
        }
    }

    #[tokio::test]
    async fn new_subscription_has_first_pix_charge() {
        let mock = MockAsaasGateway::new();

        let sub = mock.create_subscription(request()).await.unwrap();
        let payments = mock.list_subscription_payments(&sub.id).await.unwrap();

        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].billing_type, BillingType::Pix);
        assert_eq!(payments[0].due_date, request().next_due_date);
    }

    #[tokio::test]
    async fn qr_code_changes_on_every_fetch() {
        let mock = MockAsaasGateway::new();
        let sub = mock.create_subscription(request()).await.unwrap();
        let payment = &mock.list_subscription_payments(&sub.id).await.unwrap()[0];

        let first = mock.get_pix_qr_code(&payment.id).await.unwrap();
        let second = mock.get_pix_qr_code(&payment.id).await.unwrap();

        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn deleted_subscription_is_terminated() {
        let mock = MockAsaasGateway::new();
        let sub = mock.create_subscription(request()).await.unwrap();

        mock.delete_subscription(&sub.id).await.unwrap();

        assert!(mock.get_subscription(&sub.id).await.unwrap().is_terminated());
        assert!(mock.live_subscriptions().is_empty());
    }
}
