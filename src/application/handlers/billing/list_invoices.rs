//! ListInvoicesHandler - Stripe invoices, read live.

use std::sync::Arc;

use crate::application::providers::INVOICE_PAGE_SIZE;
use crate::domain::billing::{BillingError, Provider};
use crate::domain::foundation::UserId;
use crate::ports::{CustomerRepository, StripeGateway, StripeInvoice};

#[derive(Debug, Clone)]
pub struct ListInvoicesQuery {
    pub user_id: UserId,
}

pub struct ListInvoicesHandler {
    customers: Arc<dyn CustomerRepository>,
    gateway: Arc<dyn StripeGateway>,
}

impl ListInvoicesHandler {
    pub fn new(customers: Arc<dyn CustomerRepository>, gateway: Arc<dyn StripeGateway>) -> Self {
        Self { customers, gateway }
    }

    /// Most recent first. Users who never opened a Stripe customer have none.
    pub async fn handle(&self, query: ListInvoicesQuery) -> Result<Vec<StripeInvoice>, BillingError> {
        let Some(customer) = self.customers.find(&query.user_id, Provider::Stripe).await? else {
            return Ok(Vec::new());
        };

        self.gateway
            .list_invoices(&customer.provider_customer_id, INVOICE_PAGE_SIZE)
            .await
            .map_err(|e| e.into_billing(Provider::Stripe))
    }
}
