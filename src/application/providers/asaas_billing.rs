//! Asaas (PIX) implementation of the billing capability.
//!
//! Asaas cannot change a subscription's plan or undo a deletion, so plan
//! changes and reactivations open a brand-new provider subscription. Every
//! new provider subscription must come with a payable first charge; if the
//! charge or its QR code cannot be fetched the provider subscription is
//! deleted again and the operation fails.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::domain::billing::{
    asaas_canonical_status, BillingError, BillingInterval, Payment, PixCharge, Plan, Provider,
    Subscription,
};
use crate::domain::foundation::{Money, SubscriptionId, Timestamp, UserId};
use crate::ports::{
    AsaasBillingDetails, AsaasGateway, AsaasPaymentInfo, AsaasSnapshot, AsaasSubscriptionInfo,
    BillingDetails, BillingProvider, CreateAsaasCustomer, CreateAsaasSubscription,
    CustomerRepository, Enrollment, GatewayError, NewSubscription, PaymentRepository,
    ProviderSnapshot, ReturnUrls, UserProfile,
};

use super::mirror_status;

/// Days until the first PIX charge is due.
const FIRST_DUE_IN_DAYS: i64 = 1;

/// Payments listed on the billing page.
const PAYMENT_PAGE_SIZE: usize = 24;

/// A provider subscription with its first charge ready to pay.
struct OpenedSubscription {
    info: AsaasSubscriptionInfo,
    first: AsaasPaymentInfo,
    pix: PixCharge,
    next_due: Timestamp,
}

impl OpenedSubscription {
    fn first_payment(&self, subscription_id: SubscriptionId) -> Payment {
        payment_from_info(&self.first, subscription_id).with_pix(Some(self.pix.clone()))
    }
}

fn payment_from_info(info: &AsaasPaymentInfo, subscription_id: SubscriptionId) -> Payment {
    Payment::record(
        info.id.clone(),
        subscription_id,
        info.subscription_id.clone().unwrap_or_default(),
        info.customer_id.clone(),
        info.value,
        info.status.clone(),
        info.billing_type.clone(),
        info.due_date,
        info.invoice_url.clone(),
    )
}

pub struct AsaasBilling {
    gateway: Arc<dyn AsaasGateway>,
    customers: Arc<dyn CustomerRepository>,
    payments: Arc<dyn PaymentRepository>,
    fallback_tax_id: Option<String>,
}

impl AsaasBilling {
    pub fn new(
        gateway: Arc<dyn AsaasGateway>,
        customers: Arc<dyn CustomerRepository>,
        payments: Arc<dyn PaymentRepository>,
    ) -> Self {
        Self {
            gateway,
            customers,
            payments,
            fallback_tax_id: None,
        }
    }

    /// CPF/CNPJ used for users who have not provided one.
    pub fn with_fallback_tax_id(mut self, tax_id: Option<String>) -> Self {
        self.fallback_tax_id = tax_id.filter(|t| !t.trim().is_empty());
        self
    }

    fn provider_error(err: GatewayError) -> BillingError {
        err.into_billing(Provider::Asaas)
    }

    async fn customer_id(&self, user_id: &UserId) -> Result<String, BillingError> {
        self.customers
            .find(user_id, Provider::Asaas)
            .await?
            .map(|link| link.provider_customer_id)
            .ok_or_else(|| BillingError::not_found("customer", "Asaas customer not found"))
    }

    /// Creates a provider subscription and fetches its first charge and QR.
    async fn open_subscription(
        &self,
        customer_id: String,
        value: Money,
        cycle: BillingInterval,
        description: Option<String>,
    ) -> Result<OpenedSubscription, BillingError> {
        let next_due_date = Timestamp::now().add_days(FIRST_DUE_IN_DAYS).date_naive();
        let info = self
            .gateway
            .create_subscription(CreateAsaasSubscription {
                customer_id,
                value,
                next_due_date,
                cycle,
                description,
            })
            .await
            .map_err(Self::provider_error)?;

        match self.first_charge(&info.id).await {
            Ok((first, pix)) => {
                let next_due = Timestamp::from_date(info.next_due_date.unwrap_or(next_due_date));
                Ok(OpenedSubscription {
                    info,
                    first,
                    pix,
                    next_due,
                })
            }
            Err(err) => {
                self.compensate(&info.id, &err).await;
                Err(err)
            }
        }
    }

    async fn first_charge(
        &self,
        provider_subscription_id: &str,
    ) -> Result<(AsaasPaymentInfo, PixCharge), BillingError> {
        let charges = self
            .gateway
            .list_subscription_payments(provider_subscription_id)
            .await
            .map_err(Self::provider_error)?;
        let first = charges
            .into_iter()
            .min_by_key(|charge| charge.due_date)
            .ok_or_else(|| {
                BillingError::provider(
                    Provider::Asaas,
                    format!("subscription {} has no payment", provider_subscription_id),
                )
            })?;
        let pix = self
            .gateway
            .get_pix_qr_code(&first.id)
            .await
            .map_err(Self::provider_error)?;
        Ok((first, pix))
    }

    /// Deletes a provider subscription that will not be stored locally.
    async fn compensate(&self, provider_subscription_id: &str, cause: &BillingError) {
        warn!(
            asaas_subscription_id = %provider_subscription_id,
            cause = %cause.detail(),
            "Rolling back Asaas subscription"
        );
        if let Err(err) = self.gateway.delete_subscription(provider_subscription_id).await {
            error!(
                asaas_subscription_id = %provider_subscription_id,
                error = %err,
                "Failed to roll back Asaas subscription; it must be removed manually"
            );
        }
    }

    /// Brings local payments in line with the provider's list.
    async fn sync_payments(
        &self,
        subscription: &Subscription,
        charges: &[AsaasPaymentInfo],
    ) -> Result<Vec<Payment>, BillingError> {
        let mut local = self.payments.list_for_subscription(&subscription.id).await?;

        for charge in charges {
            match local.iter_mut().find(|p| p.provider_payment_id == charge.id) {
                Some(existing) => {
                    if existing.status != charge.status {
                        existing.update_status(charge.status.clone());
                        self.payments.update(existing).await?;
                    }
                }
                None => {
                    let payment = payment_from_info(charge, subscription.id);
                    self.payments.insert(&payment).await?;
                    local.push(payment);
                }
            }
        }

        // A pending QR may have been regenerated, so it is never trusted from cache.
        for payment in local.iter_mut().filter(|p| p.awaits_pix_payment()) {
            if !charges.iter().any(|c| c.id == payment.provider_payment_id) {
                continue;
            }
            let pix = self
                .gateway
                .get_pix_qr_code(&payment.provider_payment_id)
                .await
                .map_err(Self::provider_error)?;
            let before = payment.pix.clone();
            payment.refresh_pix(Some(pix));
            if payment.pix != before {
                self.payments.update(payment).await?;
            }
        }

        local.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.created_at.cmp(&b.created_at)));
        Ok(local)
    }
}

#[async_trait]
impl BillingProvider for AsaasBilling {
    fn provider(&self) -> Provider {
        Provider::Asaas
    }

    fn validate_request(
        &self,
        _plan: &Plan,
        _return_urls: Option<&ReturnUrls>,
    ) -> Result<(), BillingError> {
        Ok(())
    }

    async fn create_customer(&self, user: &UserProfile) -> Result<String, BillingError> {
        let cpf_cnpj = user
            .tax_id
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.fallback_tax_id.clone())
            .ok_or_else(|| {
                BillingError::validation("cpfCnpj", "A CPF or CNPJ is required for PIX billing")
            })?;

        self.gateway
            .create_customer(CreateAsaasCustomer {
                name: user.name.clone(),
                email: user.email.clone(),
                phone: user.phone.clone(),
                cpf_cnpj,
            })
            .await
            .map_err(Self::provider_error)
    }

    async fn create_subscription(
        &self,
        request: NewSubscription,
    ) -> Result<Enrollment, BillingError> {
        let opened = self
            .open_subscription(
                request.customer_id,
                request.plan.price,
                request.plan.interval,
                Some(request.plan.name.clone()),
            )
            .await?;

        let subscription = Subscription::start_asaas(
            request.user_id,
            &request.plan,
            opened.info.id.clone(),
            opened.next_due,
            Some(opened.info.status.clone()),
        );
        let first_payment = opened.first_payment(subscription.id);

        info!(
            user_id = %subscription.user_id,
            plan_id = %request.plan.id,
            asaas_subscription_id = %opened.info.id,
            payment_id = %first_payment.provider_payment_id,
            "Asaas PIX subscription created"
        );

        Ok(Enrollment {
            subscription,
            first_payment: Some(first_payment),
        })
    }

    async fn discard(&self, subscription: &Subscription) -> Result<(), BillingError> {
        let Some(id) = subscription.provider_subscription_id() else {
            return Ok(());
        };
        self.gateway
            .delete_subscription(id)
            .await
            .map_err(Self::provider_error)
    }

    async fn pending_checkout(
        &self,
        subscription: &Subscription,
    ) -> Result<Enrollment, BillingError> {
        let provider_id = subscription
            .provider_subscription_id()
            .ok_or_else(|| BillingError::inconsistency("Asaas subscription without provider id"))?
            .to_string();

        let charges = self
            .gateway
            .list_subscription_payments(&provider_id)
            .await
            .map_err(Self::provider_error)?;
        let payments = self.sync_payments(subscription, &charges).await?;
        let first_payment = crate::domain::billing::first_payment(&payments, &provider_id).cloned();

        Ok(Enrollment {
            subscription: subscription.clone(),
            first_payment,
        })
    }

    async fn cancel(&self, subscription: &mut Subscription) -> Result<(), BillingError> {
        if let Some(id) = subscription.provider_subscription_id() {
            self.gateway
                .delete_subscription(id)
                .await
                .map_err(Self::provider_error)?;
        }
        subscription.cancel()?;
        info!(subscription_id = %subscription.id, "Asaas subscription cancelled");
        Ok(())
    }

    async fn change_plan(
        &self,
        subscription: &mut Subscription,
        plan: &Plan,
    ) -> Result<Option<Payment>, BillingError> {
        let old_id = subscription
            .provider_subscription_id()
            .ok_or_else(|| BillingError::inconsistency("Asaas subscription without provider id"))?
            .to_string();
        let customer_id = self.customer_id(&subscription.user_id).await?;

        // New subscription first, so a failure leaves the old one untouched.
        let opened = self
            .open_subscription(customer_id, plan.price, plan.interval, Some(plan.name.clone()))
            .await?;

        if let Err(err) = self.gateway.delete_subscription(&old_id).await {
            let err = Self::provider_error(err);
            self.compensate(&opened.info.id, &err).await;
            return Err(err);
        }

        subscription.replace_provider_subscription(
            plan,
            opened.info.id.clone(),
            opened.next_due,
            Some(opened.info.status.clone()),
        )?;

        info!(
            subscription_id = %subscription.id,
            plan_id = %plan.id,
            old_asaas_subscription_id = %old_id,
            asaas_subscription_id = %opened.info.id,
            "Asaas subscription replaced for plan change"
        );
        Ok(Some(opened.first_payment(subscription.id)))
    }

    async fn reactivate(
        &self,
        subscription: &mut Subscription,
    ) -> Result<Option<Payment>, BillingError> {
        if !subscription.is_soft_cancelled() {
            return Err(BillingError::subscription_not_found());
        }
        let customer_id = self.customer_id(&subscription.user_id).await?;

        let opened = self
            .open_subscription(
                customer_id,
                subscription.provider_subscription.value,
                subscription.provider_subscription.cycle,
                None,
            )
            .await?;

        if let Err(err) = subscription.restart_provider_subscription(
            opened.info.id.clone(),
            opened.next_due,
            Some(opened.info.status.clone()),
        ) {
            let err = BillingError::from(err);
            self.compensate(&opened.info.id, &err).await;
            return Err(err);
        }

        info!(
            subscription_id = %subscription.id,
            asaas_subscription_id = %opened.info.id,
            "Asaas subscription reactivated; awaiting PIX payment"
        );
        Ok(Some(opened.first_payment(subscription.id)))
    }

    async fn refresh_status(
        &self,
        subscription: &mut Subscription,
    ) -> Result<ProviderSnapshot, BillingError> {
        let provider_id = subscription
            .provider_subscription_id()
            .ok_or_else(|| BillingError::inconsistency("Asaas subscription without provider id"))?
            .to_string();

        let info = self
            .gateway
            .get_subscription(&provider_id)
            .await
            .map_err(Self::provider_error)?;
        let charges = self
            .gateway
            .list_subscription_payments(&provider_id)
            .await
            .map_err(Self::provider_error)?;
        let payments = self.sync_payments(subscription, &charges).await?;

        let status = asaas_canonical_status(info.is_terminated(), &payments, &provider_id);
        mirror_status(
            subscription,
            status,
            Some(info.status.clone()),
            info.next_due_date.map(Timestamp::from_date),
            None,
        )?;

        Ok(ProviderSnapshot::Asaas(AsaasSnapshot {
            subscription: info,
            payments,
        }))
    }

    async fn billing_details(
        &self,
        subscription: &Subscription,
        snapshot: ProviderSnapshot,
    ) -> Result<BillingDetails, BillingError> {
        let last_payment_with_qr_code = snapshot
            .latest_payment()
            .filter(|p| p.awaits_pix_payment() && p.pix.is_some())
            .cloned();
        let ProviderSnapshot::Asaas(snapshot) = snapshot else {
            return Err(BillingError::inconsistency(format!(
                "subscription {} got a non-Asaas snapshot",
                subscription.id
            )));
        };

        let mut payments = snapshot.payments;
        payments.reverse();
        payments.truncate(PAYMENT_PAGE_SIZE);

        Ok(BillingDetails::Asaas(AsaasBillingDetails {
            subscription: snapshot.subscription,
            payments,
            last_payment_with_qr_code,
            can_update_payment_method: Provider::Asaas.can_update_payment_method(),
        }))
    }
}
