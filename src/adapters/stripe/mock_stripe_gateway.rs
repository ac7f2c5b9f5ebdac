//! In-memory Stripe for tests.
//!
//! Keeps sessions, subscriptions and invoices in a shared map so a test can
//! drive the provider side (complete a checkout, expire a session) and then
//! observe how the billing flows react. Supports:
//! - Error injection per method
//! - Call tracking

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::foundation::Timestamp;
use crate::ports::{
    CheckoutSession, CheckoutSessionRequest, CreatePriceRequest, CreateStripeCustomer,
    GatewayError, StripeGateway, StripeInvoice, StripeSubscriptionInfo,
};

/// Mock Stripe gateway.
#[derive(Default, Clone)]
pub struct MockStripeGateway {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    next_id: u32,
    sessions: HashMap<String, CheckoutSession>,
    subscriptions: HashMap<String, StripeSubscriptionInfo>,
    invoices: HashMap<String, Vec<StripeInvoice>>,
    prices: Vec<(String, CreatePriceRequest)>,
    method_errors: HashMap<String, GatewayError>,
    call_log: Vec<MethodCall>,
}

impl MockState {
    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}_{}", prefix, self.next_id)
    }
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

impl MockStripeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Provider-side actions
    // ════════════════════════════════════════════════════════════════════════════

    /// Simulates the customer paying: the session completes and an active
    /// subscription appears.
    pub fn complete_checkout(&self, session_id: &str, subscription_id: &str, customer_id: &str) {
        let mut state = self.inner.lock().unwrap();
        let price_id = state
            .sessions
            .get(session_id)
            .map(|_| "price_checkout".to_string());
        if let Some(session) = state.sessions.get_mut(session_id) {
            session.status = Some("complete".to_string());
            session.subscription_id = Some(subscription_id.to_string());
            session.url = None;
        }
        state.subscriptions.insert(
            subscription_id.to_string(),
            StripeSubscriptionInfo {
                id: subscription_id.to_string(),
                status: "active".to_string(),
                customer_id: customer_id.to_string(),
                current_period_end: Some(Timestamp::now().add_days(30)),
                cancel_at_period_end: false,
                item_id: Some(format!("si_{}", subscription_id)),
                price_id,
            },
        );
    }

    /// Lets a session time out unpaid.
    pub fn expire_session(&self, session_id: &str) {
        if let Some(session) = self.inner.lock().unwrap().sessions.get_mut(session_id) {
            session.status = Some("expired".to_string());
            session.url = None;
        }
    }

    /// Adds or replaces a subscription.
    pub fn add_subscription(&self, info: StripeSubscriptionInfo) {
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

    pub fn add_invoice(&self, customer_id: &str, invoice_id: &str) {
        let invoice = StripeInvoice {
            id: invoice_id.to_string(),
            number: Some(format!("INV-{}", invoice_id)),
            status: Some("paid".to_string()),
            amount_due: 4990,
            amount_paid: 4990,
            currency: "brl".to_string(),
            created: Some(Timestamp::now()),
            hosted_invoice_url: Some(format!("https://invoice.stripe.com/{}", invoice_id)),
            invoice_pdf: None,
            subscription_id: None,
        };
        self.inner
            .lock()
            .unwrap()
            .invoices
            .entry(customer_id.to_string())
            .or_default()
            .insert(0, invoice);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Inspection
    // ════════════════════════════════════════════════════════════════════════════

    pub fn subscription(&self, subscription_id: &str) -> Option<StripeSubscriptionInfo> {
        self.inner
            .lock()
            .unwrap()
            .subscriptions
            .get(subscription_id)
            .cloned()
    }

    pub fn session(&self, session_id: &str) -> Option<CheckoutSession> {
        self.inner.lock().unwrap().sessions.get(session_id).cloned()
    }

    /// Prices created so far, with the request that created them.
    pub fn created_prices(&self) -> Vec<(String, CreatePriceRequest)> {
        self.inner.lock().unwrap().prices.clone()
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

    /// Get all recorded method calls.
    pub fn calls(&self) -> Vec<MethodCall> {
        self.inner.lock().unwrap().call_log.clone()
    }

    /// Check if a method was called.
    pub fn was_called(&self, method: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .call_log
            .iter()
            .any(|c| c.method == method)
    }

    /// Get count of calls to a method.
    pub fn call_count(&self, method: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn record_call(&self, method: &str, args: Vec<String>) -> Result<(), GatewayError> {
        let mut state = self.inner.lock().unwrap();
        state.call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
        match state.method_errors.get(method) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn update_subscription<F>(
        &self,
        subscription_id: &str,
        change: F,
    ) -> Result<StripeSubscriptionInfo, GatewayError>
    where
        F: FnOnce(&mut StripeSubscriptionInfo),
    {
        let mut state = self.inner.lock().unwrap();
        let info = state
            .subscriptions
            .get_mut(subscription_id)
            .ok_or_else(|| GatewayError::not_found("subscription"))?;
        change(info);
        Ok(info.clone())
    }
}

#[async_trait]
impl StripeGateway for MockStripeGateway {
    async fn create_customer(&self, request: CreateStripeCustomer) -> Result<String, GatewayError> {
        self.record_call("create_customer", vec![request.user_id.to_string(), request.email])?;
        Ok(self.inner.lock().unwrap().next("cus_test"))
    }

    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        self.record_call(
            "create_checkout_session",
            vec![request.customer_id.clone(), request.price_id.clone()],
        )?;
        let mut state = self.inner.lock().unwrap();
        let id = state.next("cs_test");
        let session = CheckoutSession {
            url: Some(format!("https://checkout.stripe.com/c/pay/{}", id)),
            id: id.clone(),
            status: Some("open".to_string()),
            subscription_id: None,
        };
        state.sessions.insert(id, session.clone());
        Ok(session)
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, GatewayError> {
        self.record_call("retrieve_checkout_session", vec![session_id.to_string()])?;
        self.session(session_id)
            .ok_or_else(|| GatewayError::not_found("checkout session"))
    }

    async fn expire_checkout_session(&self, session_id: &str) -> Result<(), GatewayError> {
        self.record_call("expire_checkout_session", vec![session_id.to_string()])?;
        let mut state = self.inner.lock().unwrap();
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| GatewayError::not_found("checkout session"))?;
        if session.status.as_deref() != Some("open") {
            return Err(GatewayError::provider(format!(
                "Only open sessions can be expired: {}",
                session_id
            )));
        }
        session.status = Some("expired".to_string());
        session.url = None;
        Ok(())
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscriptionInfo, GatewayError> {
        self.record_call("retrieve_subscription", vec![subscription_id.to_string()])?;
        self.subscription(subscription_id)
            .ok_or_else(|| GatewayError::not_found("subscription"))
    }

    async fn update_subscription_price(
        &self,
        subscription_id: &str,
        item_id: &str,
        price_id: &str,
    ) -> Result<StripeSubscriptionInfo, GatewayError> {
        self.record_call(
            "update_subscription_price",
            vec![
                subscription_id.to_string(),
                item_id.to_string(),
                price_id.to_string(),
            ],
        )?;
        self.update_subscription(subscription_id, |info| {
            info.price_id = Some(price_id.to_string());
        })
    }

    async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel_at_period_end: bool,
    ) -> Result<StripeSubscriptionInfo, GatewayError> {
        self.record_call(
            "set_cancel_at_period_end",
            vec![subscription_id.to_string(), cancel_at_period_end.to_string()],
        )?;
        self.update_subscription(subscription_id, |info| {
            info.cancel_at_period_end = cancel_at_period_end;
        })
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscriptionInfo, GatewayError> {
        self.record_call("cancel_subscription", vec![subscription_id.to_string()])?;
        self.update_subscription(subscription_id, |info| {
            info.status = "canceled".to_string();
            info.cancel_at_period_end = false;
        })
    }

    async fn list_invoices(
        &self,
        customer_id: &str,
        limit: u32,
    ) -> Result<Vec<StripeInvoice>, GatewayError> {
        self.record_call("list_invoices", vec![customer_id.to_string(), limit.to_string()])?;
        let state = self.inner.lock().unwrap();
        Ok(state
            .invoices
            .get(customer_id)
            .map(|invoices| invoices.iter().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }

    async fn create_price(&self, request: CreatePriceRequest) -> Result<String, GatewayError> {
        self.record_call("create_price", vec![request.product_name.clone()])?;
        let mut state = self.inner.lock().unwrap();
        let id = state.next("price_test");
        state.prices.push((id.clone(), request));
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;

    fn request() -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            customer_id: "cus_1".to_string(),
            price_id: "price_pro".to_string(),
            user_id: UserId::new("user-1").unwrap(),
            success_url: "https://jobs.example/ok".to_string(),
            cancel_url: "https://jobs.example/cancel".to_string(),
        }
    }

    #[tokio::test]
    async fn completed_checkout_exposes_subscription() {
        let mock = MockStripeGateway::new();
        let session = mock.create_checkout_session(request()).await.unwrap();

        mock.complete_checkout(&session.id, "sub_1", "cus_1");

        let session = mock.retrieve_checkout_session(&session.id).await.unwrap();
        assert_eq!(session.subscription_id.as_deref(), Some("sub_1"));
        let sub = mock.retrieve_subscription("sub_1").await.unwrap();
        assert_eq!(sub.status, "active");
    }

    #[tokio::test]
    async fn expiring_a_completed_session_fails() {
        let mock = MockStripeGateway::new();
        let session = mock.create_checkout_session(request()).await.unwrap();
        mock.complete_checkout(&session.id, "sub_1", "cus_1");

        assert!(mock.expire_checkout_session(&session.id).await.is_err());
    }

    #[tokio::test]
    async fn method_error_only_affects_method() {
        let mock = MockStripeGateway::new();
        mock.set_method_error("list_invoices", GatewayError::network("reset"));

        assert!(mock.list_invoices("cus_1", 10).await.is_err());
        assert!(mock.create_checkout_session(request()).await.is_ok());
        assert_eq!(mock.call_count("list_invoices"), 1);
    }

    #[tokio::test]
    async fn missing_subscription_is_not_found() {
        let mock = MockStripeGateway::new();

        let err = mock.retrieve_subscription("sub_missing").await.unwrap_err();

        assert!(!err.retryable);
    }
}
