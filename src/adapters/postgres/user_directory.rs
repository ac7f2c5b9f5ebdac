//! PostgreSQL implementation of UserDirectory.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, UserId};
use crate::ports::{UserDirectory, UserProfile};

use super::{corrupt_column, query_failed};

const USER_SELECT: &str = "SELECT id, auth_subject, name, email, phone, tax_id FROM users";

/// Read-only access to the users table owned by the auth service.
pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, column: &str, value: &str) -> Result<Option<UserProfile>, DomainError> {
        let sql = format!("{} WHERE {} = $1", USER_SELECT, column);
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_failed("fetch user", e))?;

        row.map(UserProfile::try_from).transpose()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    auth_subject: String,
    name: String,
    email: String,
    phone: Option<String>,
    tax_id: Option<String>,
}

impl TryFrom<UserRow> for UserProfile {
    type Error = DomainError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(UserProfile {
            id: UserId::new(row.id).map_err(|e| corrupt_column("id", e))?,
            auth_subject: row.auth_subject,
            name: row.name,
            email: row.email,
            phone: row.phone,
            tax_id: row.tax_id,
        })
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserProfile>, DomainError> {
        self.fetch("id", id.as_str()).await
    }

    async fn find_by_auth_subject(
        &self,
        subject: &str,
    ) -> Result<Option<UserProfile>, DomainError> {
        self.fetch("auth_subject", subject).await
    }
}
