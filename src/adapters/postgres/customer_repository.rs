//! PostgreSQL implementation of CustomerRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::billing::{CustomerLink, Provider};
use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::ports::CustomerRepository;

use super::{corrupt_column, query_failed};

pub struct PostgresCustomerRepository {
    pool: PgPool,
}

impl PostgresCustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    user_id: String,
    provider: String,
    provider_customer_id: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for CustomerLink {
    type Error = DomainError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        Ok(CustomerLink {
            user_id: UserId::new(row.user_id).map_err(|e| corrupt_column("user_id", e))?,
            provider: row
                .provider
                .parse::<Provider>()
                .map_err(|e| corrupt_column("provider", e))?,
            provider_customer_id: row.provider_customer_id,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[async_trait]
impl CustomerRepository for PostgresCustomerRepository {
    async fn find(
        &self,
        user_id: &UserId,
        provider: Provider,
    ) -> Result<Option<CustomerLink>, DomainError> {
        let row: Option<CustomerRow> = sqlx::query_as(
            r#"
            SELECT user_id, provider, provider_customer_id, created_at
            FROM billing_customers
            WHERE user_id = $1 AND provider = $2
            "#,
        )
        .bind(user_id.as_str())
        .bind(provider.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_failed("fetch customer", e))?;

        row.map(CustomerLink::try_from).transpose()
    }

    async fn insert(&self, link: &CustomerLink) -> Result<CustomerLink, DomainError> {
        // The no-op update makes RETURNING yield the row that won a race.
        let row: CustomerRow = sqlx::query_as(
            r#"
            INSERT INTO billing_customers (user_id, provider, provider_customer_id, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, provider) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING user_id, provider, provider_customer_id, created_at
            "#,
        )
        .bind(link.user_id.as_str())
        .bind(link.provider.as_str())
        .bind(&link.provider_customer_id)
        .bind(link.created_at.as_datetime())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| query_failed("insert customer", e))?;

        CustomerLink::try_from(row)
    }
}
