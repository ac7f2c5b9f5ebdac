//! Subscription aggregate.
//!
//! The canonical `Subscription` is what access rights derive from. It embeds
//! its `ProviderSubscription`, the last-known view of the provider's own
//! record, so the two are always written together.
//!
//! # Invariants
//!
//! - At most one subscription per user holds the slot (Pending or Active).
//!   The repository enforces this with a partial unique index.
//! - A subscription we cancelled ourselves (`cancel`) never changes status
//!   again. A `Cancelled` reported by the provider (an unpaid card, say)
//!   is not final and follows the provider back to `Active`.
//! - A Stripe subscription stays `ProviderRef::Pending` until the checkout
//!   webhook supplies the real subscription id.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    DomainError, ErrorCode, Money, PlanId, StateMachine, SubscriptionId, Timestamp, UserId,
};

use super::{BillingInterval, Plan, Provider, SubscriptionStatus};

/// Link to the provider-side subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProviderRef {
    /// Checkout started; the placeholder is the checkout session id.
    Pending { placeholder: String },

    /// The provider's real subscription id.
    Confirmed { id: String },
}

impl ProviderRef {
    /// The id currently stored for lookups, whichever variant.
    pub fn external_id(&self) -> &str {
        match self {
            ProviderRef::Pending { placeholder } => placeholder,
            ProviderRef::Confirmed { id } => id,
        }
    }

    /// The real provider id, if known.
    pub fn confirmed_id(&self) -> Option<&str> {
        match self {
            ProviderRef::Pending { .. } => None,
            ProviderRef::Confirmed { id } => Some(id),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, ProviderRef::Confirmed { .. })
    }
}

/// Cached copy of the provider's subscription state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSubscription {
    pub reference: ProviderRef,

    /// Canonical reading of the provider status.
    pub status: SubscriptionStatus,

    /// Status string exactly as the provider last reported it.
    pub raw_status: Option<String>,

    pub current_period_end: Option<Timestamp>,
    pub value: Money,
    pub cycle: BillingInterval,
}

/// Provider-agnostic subscription record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub provider: Provider,
    pub status: SubscriptionStatus,
    pub price_amount: Money,
    pub interval: BillingInterval,
    pub current_period_end: Option<Timestamp>,
    pub cancel_at_period_end: bool,
    pub provider_subscription: ProviderSubscription,

    /// Hosted checkout page while a Stripe checkout is outstanding.
    pub checkout_url: Option<String>,

    /// Set by `cancel`. Provider reports never clear it.
    #[serde(default)]
    pub cancelled_locally: bool,

    /// Write counter for optimistic concurrency. Owned by the repository.
    #[serde(skip)]
    pub version: i64,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Subscription {
    /// Starts a Stripe subscription whose checkout has not completed yet.
    pub fn start_stripe_checkout(
        user_id: UserId,
        plan: &Plan,
        checkout_session_id: impl Into<String>,
        checkout_url: impl Into<String>,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: SubscriptionId::new(),
            user_id,
            plan_id: plan.id,
            provider: Provider::Stripe,
            status: SubscriptionStatus::Pending,
            price_amount: plan.price,
            interval: plan.interval,
            current_period_end: None,
            cancel_at_period_end: false,
            provider_subscription: ProviderSubscription {
                reference: ProviderRef::Pending {
                    placeholder: checkout_session_id.into(),
                },
                status: SubscriptionStatus::Pending,
                raw_status: None,
                current_period_end: None,
                value: plan.price,
                cycle: plan.interval,
            },
            checkout_url: Some(checkout_url.into()),
            cancelled_locally: false,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Starts an Asaas subscription awaiting its first PIX payment.
    pub fn start_asaas(
        user_id: UserId,
        plan: &Plan,
        asaas_subscription_id: impl Into<String>,
        next_due: Timestamp,
        raw_status: Option<String>,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: SubscriptionId::new(),
            user_id,
            plan_id: plan.id,
            provider: Provider::Asaas,
            status: SubscriptionStatus::Pending,
            price_amount: plan.price,
            interval: plan.interval,
            current_period_end: Some(next_due),
            cancel_at_period_end: false,
            provider_subscription: ProviderSubscription {
                reference: ProviderRef::Confirmed {
                    id: asaas_subscription_id.into(),
                },
                status: SubscriptionStatus::Pending,
                raw_status,
                current_period_end: Some(next_due),
                value: plan.price,
                cycle: plan.interval,
            },
            checkout_url: None,
            cancelled_locally: false,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when the subscription was cancelled to take effect at period end.
    pub fn is_soft_cancelled(&self) -> bool {
        self.status == SubscriptionStatus::Cancelled
            && self.cancel_at_period_end
            && !self.cancelled_locally
    }

    /// True when we cancelled the subscription outright.
    pub fn is_hard_cancelled(&self) -> bool {
        self.status == SubscriptionStatus::Cancelled && self.cancelled_locally
    }

    /// The provider's real subscription id, if the checkout has completed.
    pub fn provider_subscription_id(&self) -> Option<&str> {
        self.provider_subscription.reference.confirmed_id()
    }

    /// Resolves a pending Stripe checkout to the real subscription.
    ///
    /// Replaying the same confirmation is a no-op.
    pub fn confirm_checkout(
        &mut self,
        provider_subscription_id: impl Into<String>,
        current_period_end: Option<Timestamp>,
        cancel_at_period_end: bool,
    ) -> Result<(), DomainError> {
        let provider_subscription_id = provider_subscription_id.into();
        if let ProviderRef::Confirmed { id } = &self.provider_subscription.reference {
            if id != &provider_subscription_id {
                return Err(DomainError::new(
                    ErrorCode::InvalidStateTransition,
                    "Checkout already confirmed with a different subscription",
                )
                .with_detail("existing", id.clone())
                .with_detail("incoming", provider_subscription_id));
            }
        }

        self.move_to(SubscriptionStatus::Active)?;
        self.provider_subscription.reference = ProviderRef::Confirmed {
            id: provider_subscription_id,
        };
        self.provider_subscription.status = SubscriptionStatus::Active;
        self.cancel_at_period_end = cancel_at_period_end;
        self.checkout_url = None;
        if current_period_end.is_some() {
            self.set_period_end(current_period_end);
        }
        self.touch();
        Ok(())
    }

    /// Marks the subscription paid.
    pub fn activate(&mut self) -> Result<(), DomainError> {
        self.move_to(SubscriptionStatus::Active)?;
        self.provider_subscription.status = SubscriptionStatus::Active;
        self.touch();
        Ok(())
    }

    /// Marks the subscription as awaiting payment.
    pub fn mark_pending(&mut self) -> Result<(), DomainError> {
        self.move_to(SubscriptionStatus::Pending)?;
        self.provider_subscription.status = SubscriptionStatus::Pending;
        self.touch();
        Ok(())
    }

    /// Mirrors a status the provider reported onto both records.
    ///
    /// Validates first and mutates only on success, so a rejected update
    /// leaves the aggregate untouched. The cancel-at-period-end flag is
    /// ignored once the subscription was cancelled locally.
    pub fn apply_provider_status(
        &mut self,
        status: SubscriptionStatus,
        raw_status: Option<String>,
        current_period_end: Option<Timestamp>,
        cancel_at_period_end: Option<bool>,
    ) -> Result<(), DomainError> {
        self.check_transition(status)?;

        self.status = status;
        self.provider_subscription.status = status;
        if raw_status.is_some() {
            self.provider_subscription.raw_status = raw_status;
        }
        if let Some(flag) = cancel_at_period_end.filter(|_| !self.cancelled_locally) {
            self.cancel_at_period_end = flag;
        }
        if current_period_end.is_some() {
            self.set_period_end(current_period_end);
        }
        self.touch();
        Ok(())
    }

    /// Cancels immediately. Not reactivatable afterwards.
    pub fn cancel(&mut self) -> Result<(), DomainError> {
        self.move_to(SubscriptionStatus::Cancelled)?;
        self.provider_subscription.status = SubscriptionStatus::Cancelled;
        self.cancel_at_period_end = false;
        self.cancelled_locally = true;
        self.checkout_url = None;
        self.touch();
        Ok(())
    }

    /// Changes the plan while keeping the provider subscription (Stripe).
    pub fn switch_plan(&mut self, plan: &Plan) {
        self.plan_id = plan.id;
        self.price_amount = plan.price;
        self.interval = plan.interval;
        self.provider_subscription.value = plan.price;
        self.provider_subscription.cycle = plan.interval;
        self.touch();
    }

    /// Points the subscription at a brand-new provider subscription (Asaas).
    ///
    /// Used for plan changes and reactivation, both of which need a fresh
    /// PIX charge, so the status returns to `Pending`.
    pub fn replace_provider_subscription(
        &mut self,
        plan: &Plan,
        provider_subscription_id: impl Into<String>,
        next_due: Timestamp,
        raw_status: Option<String>,
    ) -> Result<(), DomainError> {
        self.move_to(SubscriptionStatus::Pending)?;
        self.switch_plan(plan);
        self.cancel_at_period_end = false;
        self.provider_subscription.reference = ProviderRef::Confirmed {
            id: provider_subscription_id.into(),
        };
        self.provider_subscription.status = SubscriptionStatus::Pending;
        self.provider_subscription.raw_status = raw_status;
        self.set_period_end(Some(next_due));
        self.touch();
        Ok(())
    }

    /// Points a soft-cancelled subscription at a new provider subscription
    /// on the same terms (Asaas reactivation). Payment must be redone.
    pub fn restart_provider_subscription(
        &mut self,
        provider_subscription_id: impl Into<String>,
        next_due: Timestamp,
        raw_status: Option<String>,
    ) -> Result<(), DomainError> {
        if !self.is_soft_cancelled() {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                "Only subscriptions cancelled at period end can be reactivated",
            ));
        }
        self.move_to(SubscriptionStatus::Pending)?;
        self.cancel_at_period_end = false;
        self.provider_subscription.reference = ProviderRef::Confirmed {
            id: provider_subscription_id.into(),
        };
        self.provider_subscription.status = SubscriptionStatus::Pending;
        self.provider_subscription.raw_status = raw_status;
        self.set_period_end(Some(next_due));
        self.touch();
        Ok(())
    }

    /// Undoes a soft cancel in place (Stripe).
    pub fn resume(&mut self) -> Result<(), DomainError> {
        if !self.is_soft_cancelled() {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                "Only subscriptions cancelled at period end can be reactivated",
            ));
        }
        self.move_to(SubscriptionStatus::Active)?;
        self.provider_subscription.status = SubscriptionStatus::Active;
        self.cancel_at_period_end = false;
        self.touch();
        Ok(())
    }

    /// Updates the period end on both records.
    pub fn set_period_end(&mut self, current_period_end: Option<Timestamp>) {
        self.current_period_end = current_period_end;
        self.provider_subscription.current_period_end = current_period_end;
    }

    fn check_transition(&self, target: SubscriptionStatus) -> Result<(), DomainError> {
        if self.status == target {
            return Ok(());
        }
        if self.is_hard_cancelled() {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Subscription was cancelled and cannot move to {}", target),
            )
            .with_detail("subscription_id", self.id.to_string()));
        }
        self.status.transition_to(target).map_err(|e| {
            DomainError::new(ErrorCode::InvalidStateTransition, e.to_string())
                .with_detail("subscription_id", self.id.to_string())
        })?;
        Ok(())
    }

    fn move_to(&mut self, target: SubscriptionStatus) -> Result<(), DomainError> {
        self.check_transition(target)?;
        self.status = target;
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Timestamp::now();
    }
}
