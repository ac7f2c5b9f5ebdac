//! PostgreSQL implementation of SubscriptionRepository.
//!
//! A subscription and its provider cache are two tables written in one
//! transaction, together with the payment that came with the change.
//! The partial unique index `subscriptions_one_live_per_user` keeps a user
//! to one PENDING or ACTIVE subscription across processes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::billing::{
    BillingInterval, Payment, Provider, ProviderRef, ProviderSubscription, Subscription,
    SubscriptionStatus,
};
use crate::domain::foundation::{
    DomainError, ErrorCode, Money, PlanId, SubscriptionId, Timestamp, UserId,
};
use crate::ports::SubscriptionRepository;

use super::payment_repository::insert_payment;
use super::{corrupt_column, query_failed, violated_constraint};

const LIVE_SLOT_CONSTRAINT: &str = "subscriptions_one_live_per_user";

const SUBSCRIPTION_SELECT: &str = r#"
    SELECT
        s.id, s.user_id, s.plan_id, s.provider, s.status, s.price_cents, s.interval,
        s.current_period_end, s.cancel_at_period_end, s.checkout_url,
        s.cancelled_locally, s.version, s.created_at, s.updated_at,
        ps.external_id, ps.confirmed, ps.status AS provider_status, ps.raw_status,
        ps.current_period_end AS provider_period_end, ps.value_cents, ps.cycle
    FROM subscriptions s
    JOIN provider_subscriptions ps ON ps.subscription_id = s.id
"#;

pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The user's newest subscription matching `condition`.
    async fn newest_for_user(
        &self,
        user_id: &UserId,
        condition: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        let sql = format!(
            "{} WHERE s.user_id = $1{} ORDER BY s.created_at DESC LIMIT 1",
            SUBSCRIPTION_SELECT, condition
        );
        let row: Option<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_failed("fetch subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    user_id: String,
    plan_id: Uuid,
    provider: String,
    status: String,
    price_cents: i64,
    interval: String,
    current_period_end: Option<DateTime<Utc>>,
    cancel_at_period_end: bool,
    checkout_url: Option<String>,
    cancelled_locally: bool,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    external_id: String,
    confirmed: bool,
    provider_status: String,
    raw_status: Option<String>,
    provider_period_end: Option<DateTime<Utc>>,
    value_cents: i64,
    cycle: String,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let reference = if row.confirmed {
            ProviderRef::Confirmed { id: row.external_id }
        } else {
            ProviderRef::Pending {
                placeholder: row.external_id,
            }
        };

        Ok(Subscription {
            id: SubscriptionId::from_uuid(row.id),
            user_id: UserId::new(row.user_id).map_err(|e| corrupt_column("user_id", e))?,
            plan_id: PlanId::from_uuid(row.plan_id),
            provider: row
                .provider
                .parse::<Provider>()
                .map_err(|e| corrupt_column("provider", e))?,
            status: parse_status("status", &row.status)?,
            price_amount: Money::from_cents(row.price_cents)
                .map_err(|e| corrupt_column("price_cents", e))?,
            interval: parse_interval("interval", &row.interval)?,
            current_period_end: row.current_period_end.map(Timestamp::from_datetime),
            cancel_at_period_end: row.cancel_at_period_end,
            provider_subscription: ProviderSubscription {
                reference,
                status: parse_status("provider_status", &row.provider_status)?,
                raw_status: row.raw_status,
                current_period_end: row.provider_period_end.map(Timestamp::from_datetime),
                value: Money::from_cents(row.value_cents)
                    .map_err(|e| corrupt_column("value_cents", e))?,
                cycle: parse_interval("cycle", &row.cycle)?,
            },
            checkout_url: row.checkout_url,
            cancelled_locally: row.cancelled_locally,
            version: row.version,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn parse_status(column: &str, value: &str) -> Result<SubscriptionStatus, DomainError> {
    value
        .parse::<SubscriptionStatus>()
        .map_err(|e| corrupt_column(column, e))
}

fn parse_interval(column: &str, value: &str) -> Result<BillingInterval, DomainError> {
    value
        .parse::<BillingInterval>()
        .map_err(|e| corrupt_column(column, e))
}

fn map_write_error(action: &str, subscription: &Subscription, err: sqlx::Error) -> DomainError {
    if violated_constraint(&err) == Some(LIVE_SLOT_CONSTRAINT) {
        return DomainError::new(
            ErrorCode::SubscriptionAlreadyActive,
            "User already has a pending or active subscription",
        )
        .with_detail("user_id", subscription.user_id.to_string());
    }
    query_failed(action, err)
}

/// Explains an update that matched no row: gone, or written since it was read.
async fn missed_update(conn: &mut PgConnection, subscription: &Subscription) -> DomainError {
    let current = sqlx::query_scalar::<_, i64>("SELECT version FROM subscriptions WHERE id = $1")
        .bind(subscription.id.as_uuid())
        .fetch_optional(&mut *conn)
        .await;
    match current {
        Ok(Some(current)) => stale_write(subscription, current),
        Ok(None) => {
            DomainError::not_found(ErrorCode::SubscriptionNotFound, "Subscription", subscription.id)
        }
        Err(e) => query_failed("check subscription version", e),
    }
}

pub(crate) fn stale_write(subscription: &Subscription, current: i64) -> DomainError {
    DomainError::new(
        ErrorCode::ConcurrentModification,
        "Subscription was modified by another writer",
    )
    .with_detail("subscription_id", subscription.id.to_string())
    .with_detail("expected_version", subscription.version.to_string())
    .with_detail("current_version", current.to_string())
}

async fn write_provider_cache(
    conn: &mut PgConnection,
    subscription: &Subscription,
) -> Result<(), DomainError> {
    let cache = &subscription.provider_subscription;
    sqlx::query(
        r#"
        INSERT INTO provider_subscriptions (
            subscription_id, provider, external_id, confirmed, status, raw_status,
            current_period_end, value_cents, cycle, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (subscription_id) DO UPDATE SET
            external_id = EXCLUDED.external_id,
            confirmed = EXCLUDED.confirmed,
            status = EXCLUDED.status,
            raw_status = EXCLUDED.raw_status,
            current_period_end = EXCLUDED.current_period_end,
            value_cents = EXCLUDED.value_cents,
            cycle = EXCLUDED.cycle,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(subscription.id.as_uuid())
    .bind(subscription.provider.as_str())
    .bind(cache.reference.external_id())
    .bind(cache.reference.is_confirmed())
    .bind(cache.status.as_str())
    .bind(&cache.raw_status)
    .bind(cache.current_period_end.as_ref().map(Timestamp::as_datetime))
    .bind(cache.value.cents())
    .bind(cache.cycle.as_str())
    .bind(subscription.updated_at.as_datetime())
    .execute(&mut *conn)
    .await
    .map_err(|e| query_failed("write provider subscription", e))?;

    Ok(())
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn insert(
        &self,
        subscription: &Subscription,
        first_payment: Option<&Payment>,
    ) -> Result<(), DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| query_failed("start transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, user_id, plan_id, provider, status, price_cents, interval,
                current_period_end, cancel_at_period_end, checkout_url, cancelled_locally,
                version, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.user_id.as_str())
        .bind(subscription.plan_id.as_uuid())
        .bind(subscription.provider.as_str())
        .bind(subscription.status.as_str())
        .bind(subscription.price_amount.cents())
        .bind(subscription.interval.as_str())
        .bind(subscription.current_period_end.as_ref().map(Timestamp::as_datetime))
        .bind(subscription.cancel_at_period_end)
        .bind(&subscription.checkout_url)
        .bind(subscription.cancelled_locally)
        .bind(subscription.version)
        .bind(subscription.created_at.as_datetime())
        .bind(subscription.updated_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_write_error("insert subscription", subscription, e))?;

        write_provider_cache(&mut tx, subscription).await?;
        if let Some(payment) = first_payment {
            insert_payment(&mut tx, payment).await?;
        }

        tx.commit()
            .await
            .map_err(|e| query_failed("commit transaction", e))?;
        Ok(())
    }

    async fn update(
        &self,
        subscription: &Subscription,
        new_payment: Option<&Payment>,
    ) -> Result<(), DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| query_failed("start transaction", e))?;

        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET
                plan_id = $2,
                status = $3,
                price_cents = $4,
                interval = $5,
                current_period_end = $6,
                cancel_at_period_end = $7,
                checkout_url = $8,
                cancelled_locally = $9,
                updated_at = $10,
                version = version + 1
            WHERE id = $1 AND version = $11
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.plan_id.as_uuid())
        .bind(subscription.status.as_str())
        .bind(subscription.price_amount.cents())
        .bind(subscription.interval.as_str())
        .bind(subscription.current_period_end.as_ref().map(Timestamp::as_datetime))
        .bind(subscription.cancel_at_period_end)
        .bind(&subscription.checkout_url)
        .bind(subscription.cancelled_locally)
        .bind(subscription.updated_at.as_datetime())
        .bind(subscription.version)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_write_error("update subscription", subscription, e))?;

        if result.rows_affected() == 0 {
            return Err(missed_update(&mut tx, subscription).await);
        }

        write_provider_cache(&mut tx, subscription).await?;
        if let Some(payment) = new_payment {
            insert_payment(&mut tx, payment).await?;
        }

        tx.commit()
            .await
            .map_err(|e| query_failed("commit transaction", e))?;
        Ok(())
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        let sql = format!("{} WHERE s.id = $1", SUBSCRIPTION_SELECT);
        let row: Option<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_failed("fetch subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_current_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        self.newest_for_user(user_id, " AND s.status IN ('PENDING', 'ACTIVE')")
            .await
    }

    async fn find_latest_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        self.newest_for_user(user_id, "").await
    }

    async fn find_reactivatable_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        self.newest_for_user(
            user_id,
            " AND s.status = 'CANCELLED' AND s.cancel_at_period_end AND NOT s.cancelled_locally",
        )
        .await
    }

    async fn find_by_provider_reference(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        let sql = format!(
            "{} WHERE ps.provider = $1 AND ps.external_id = $2",
            SUBSCRIPTION_SELECT
        );
        let row: Option<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(provider.as_str())
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_failed("fetch subscription by provider reference", e))?;

        row.map(Subscription::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> SubscriptionRow {
        let now = Utc::now();
        SubscriptionRow {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            plan_id: Uuid::new_v4(),
            provider: "STRIPE".to_string(),
            status: "PENDING".to_string(),
            price_cents: 4990,
            interval: "month".to_string(),
            current_period_end: None,
            cancel_at_period_end: false,
            checkout_url: Some("https://checkout.stripe.com/c/pay/cs_1".to_string()),
            cancelled_locally: false,
            version: 0,
            created_at: now,
            updated_at: now,
            external_id: "cs_1".to_string(),
            confirmed: false,
            provider_status: "PENDING".to_string(),
            raw_status: None,
            provider_period_end: None,
            value_cents: 4990,
            cycle: "month".to_string(),
        }
    }

    #[test]
    fn unconfirmed_row_keeps_checkout_placeholder() {
        let subscription = Subscription::try_from(row()).unwrap();

        assert_eq!(
            subscription.provider_subscription.reference,
            ProviderRef::Pending {
                placeholder: "cs_1".to_string()
            }
        );
        assert_eq!(subscription.provider_subscription_id(), None);
        assert_eq!(subscription.status, SubscriptionStatus::Pending);
    }

    #[test]
    fn confirmed_row_exposes_provider_id() {
        let subscription = Subscription::try_from(SubscriptionRow {
            status: "ACTIVE".to_string(),
            provider_status: "ACTIVE".to_string(),
            raw_status: Some("active".to_string()),
            external_id: "sub_1".to_string(),
            confirmed: true,
            checkout_url: None,
            ..row()
        })
        .unwrap();

        assert_eq!(subscription.provider_subscription_id(), Some("sub_1"));
        assert_eq!(subscription.status, SubscriptionStatus::Active);
    }

    #[test]
    fn unknown_provider_is_corrupt() {
        let err = Subscription::try_from(SubscriptionRow {
            provider: "PAYPAL".to_string(),
            ..row()
        })
        .unwrap_err();

        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(err.message.contains("provider"));
    }

    #[test]
    fn lowercase_status_is_corrupt() {
        assert!(Subscription::try_from(SubscriptionRow {
            status: "active".to_string(),
            ..row()
        })
        .is_err());
    }

    #[test]
    fn local_cancel_and_version_survive_the_round_trip() {
        let subscription = Subscription::try_from(SubscriptionRow {
            status: "CANCELLED".to_string(),
            provider_status: "CANCELLED".to_string(),
            cancelled_locally: true,
            version: 7,
            ..row()
        })
        .unwrap();

        assert!(subscription.is_hard_cancelled());
        assert_eq!(subscription.version, 7);
    }

    #[test]
    fn stale_write_names_both_versions() {
        let subscription = Subscription::try_from(SubscriptionRow { version: 2, ..row() }).unwrap();

        let err = stale_write(&subscription, 3);

        assert_eq!(err.code, ErrorCode::ConcurrentModification);
        assert_eq!(err.details.get("expected_version"), Some(&"2".to_string()));
        assert_eq!(err.details.get("current_version"), Some(&"3".to_string()));
    }
}
