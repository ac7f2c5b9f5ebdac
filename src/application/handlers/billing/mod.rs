//! Billing handlers.
//!
//! ## Commands
//! - Subscribing through Stripe checkout or Asaas PIX
//! - Changing plan, cancelling and reactivating
//! - Reconciling provider webhooks
//!
//! ## Queries
//! - Billing summary and payment status
//! - The subscription as each provider sees it
//! - A single PIX payment, Stripe invoices

mod cancel_subscription;
mod change_plan;
mod create_subscription;
mod customers;
mod get_billing_summary;
mod get_payment;
mod get_payment_status;
mod get_provider_subscription;
mod handle_asaas_webhook;
mod handle_stripe_webhook;
mod list_invoices;
mod reactivate_subscription;
mod webhook_ledger;

#[cfg(test)]
pub(crate) mod test_support;

// Commands
pub use cancel_subscription::{CancelSubscriptionCommand, CancelSubscriptionHandler};
pub use change_plan::{ChangePlanCommand, ChangePlanHandler, ChangePlanResult};
pub use create_subscription::{
    CreateSubscriptionCommand, CreateSubscriptionHandler, CreateSubscriptionResult,
};
pub use handle_asaas_webhook::{HandleAsaasWebhookCommand, HandleAsaasWebhookHandler};
pub use handle_stripe_webhook::{HandleStripeWebhookCommand, HandleStripeWebhookHandler};
pub use reactivate_subscription::{
    ReactivateSubscriptionCommand, ReactivateSubscriptionHandler, ReactivateSubscriptionResult,
};

// Queries
pub use get_billing_summary::{
    BillingSummary, GetBillingSummaryHandler, GetBillingSummaryQuery, SummaryStatus,
};
pub use get_payment::{GetPaymentHandler, GetPaymentQuery};
pub use get_payment_status::{GetPaymentStatusHandler, GetPaymentStatusQuery, PaymentStatusView};
pub use get_provider_subscription::{
    GetProviderSubscriptionHandler, GetProviderSubscriptionQuery, ProviderSubscriptionView,
    SubscriptionLookup,
};
pub use list_invoices::{ListInvoicesHandler, ListInvoicesQuery};
