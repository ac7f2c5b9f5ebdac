//! Canonical status derivation for Asaas subscriptions.
//!
//! Asaas reports `ACTIVE` for a subscription as soon as it exists, before
//! anything is paid, so its own status only tells us whether it was
//! terminated. Whether the user has paid is read from the first charge of
//! the current provider subscription. Webhooks and polling share this rule
//! so they always agree.

use super::{first_payment, Payment, SubscriptionStatus};

/// Derives the canonical status from the provider's view.
///
/// - provider terminated the subscription: `Cancelled`
/// - first charge settled: `Active`
/// - otherwise: `Pending`
pub fn asaas_canonical_status(
    provider_terminated: bool,
    payments: &[Payment],
    provider_subscription_id: &str,
) -> SubscriptionStatus {
    if provider_terminated {
        return SubscriptionStatus::Cancelled;
    }
    match first_payment(payments, provider_subscription_id) {
        Some(first) if first.status.is_settled() => SubscriptionStatus::Active,
        _ => SubscriptionStatus::Pending,
    }
}
