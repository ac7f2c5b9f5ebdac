//! PostgreSQL implementation of PlanRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{BillingInterval, Plan};
use crate::domain::foundation::{DomainError, ErrorCode, Money, PlanId, Timestamp};
use crate::ports::PlanRepository;

use super::{corrupt_column, query_failed};

const PLAN_SELECT: &str = r#"
    SELECT id, name, description, features, price_cents, interval,
           stripe_price_id, active, created_at, updated_at
    FROM plans
"#;

pub struct PostgresPlanRepository {
    pool: PgPool,
}

impl PostgresPlanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PlanRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    features: Vec<String>,
    price_cents: i64,
    interval: String,
    stripe_price_id: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PlanRow> for Plan {
    type Error = DomainError;

    fn try_from(row: PlanRow) -> Result<Self, Self::Error> {
        Ok(Plan {
            id: PlanId::from_uuid(row.id),
            name: row.name,
            description: row.description,
            features: row.features,
            price: Money::from_cents(row.price_cents)
                .map_err(|e| corrupt_column("price_cents", e))?,
            interval: row
                .interval
                .parse::<BillingInterval>()
                .map_err(|e| corrupt_column("interval", e))?,
            stripe_price_id: row.stripe_price_id,
            active: row.active,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[async_trait]
impl PlanRepository for PostgresPlanRepository {
    async fn find_by_id(&self, id: &PlanId) -> Result<Option<Plan>, DomainError> {
        let sql = format!("{} WHERE id = $1", PLAN_SELECT);
        let row: Option<PlanRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_failed("fetch plan", e))?;

        row.map(Plan::try_from).transpose()
    }

    async fn list_active(&self) -> Result<Vec<Plan>, DomainError> {
        let sql = format!("{} WHERE active ORDER BY price_cents ASC", PLAN_SELECT);
        let rows: Vec<PlanRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_failed("list plans", e))?;

        rows.into_iter().map(Plan::try_from).collect()
    }

    async fn insert(&self, plan: &Plan) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO plans (
                id, name, description, features, price_cents, interval,
                stripe_price_id, active, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(plan.id.as_uuid())
        .bind(&plan.name)
        .bind(&plan.description)
        .bind(&plan.features)
        .bind(plan.price.cents())
        .bind(plan.interval.as_str())
        .bind(&plan.stripe_price_id)
        .bind(plan.active)
        .bind(plan.created_at.as_datetime())
        .bind(plan.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("insert plan", e))?;

        Ok(())
    }

    async fn update(&self, plan: &Plan) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE plans SET
                name = $2,
                description = $3,
                features = $4,
                price_cents = $5,
                interval = $6,
                stripe_price_id = $7,
                active = $8,
                updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(plan.id.as_uuid())
        .bind(&plan.name)
        .bind(&plan.description)
        .bind(&plan.features)
        .bind(plan.price.cents())
        .bind(plan.interval.as_str())
        .bind(&plan.stripe_price_id)
        .bind(plan.active)
        .bind(plan.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("update plan", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(ErrorCode::PlanNotFound, "Plan", plan.id));
        }

        Ok(())
    }
}
