//! PostgreSQL implementation of PaymentRepository.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::billing::{BillingType, Payment, PaymentStatus, PixCharge};
use crate::domain::foundation::{
    DomainError, ErrorCode, Money, PaymentId, SubscriptionId, Timestamp, UserId,
};
use crate::ports::PaymentRepository;

use super::{corrupt_column, query_failed};

const PAYMENT_COLUMNS: &str = r#"
    p.id, p.provider_payment_id, p.subscription_id, p.provider_subscription_id,
    p.provider_customer_id, p.value_cents, p.status, p.billing_type, p.due_date,
    p.invoice_url, p.pix_qr_code_image, p.pix_copy_paste_key, p.created_at, p.updated_at
"#;

pub struct PostgresPaymentRepository {
    pool: PgPool,
}

impl PostgresPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct PaymentRow {
    id: Uuid,
    provider_payment_id: String,
    subscription_id: Uuid,
    provider_subscription_id: String,
    provider_customer_id: String,
    value_cents: i64,
    status: String,
    billing_type: String,
    due_date: NaiveDate,
    invoice_url: Option<String>,
    pix_qr_code_image: Option<String>,
    pix_copy_paste_key: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        // Both halves of the PIX charge are written together.
        let pix = match (row.pix_qr_code_image, row.pix_copy_paste_key) {
            (Some(qr_code_image), Some(copy_paste_key)) => Some(PixCharge {
                qr_code_image,
                copy_paste_key,
            }),
            _ => None,
        };

        Ok(Payment {
            id: PaymentId::from_uuid(row.id),
            provider_payment_id: row.provider_payment_id,
            subscription_id: SubscriptionId::from_uuid(row.subscription_id),
            provider_subscription_id: row.provider_subscription_id,
            provider_customer_id: row.provider_customer_id,
            value: Money::from_cents(row.value_cents)
                .map_err(|e| corrupt_column("value_cents", e))?,
            status: PaymentStatus::from(row.status),
            billing_type: BillingType::from(row.billing_type),
            due_date: row.due_date,
            invoice_url: row.invoice_url,
            pix,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

/// Inserts a payment on an open connection so subscription writes can
/// include it in their transaction. Existing provider ids are left alone.
pub(super) async fn insert_payment(
    conn: &mut PgConnection,
    payment: &Payment,
) -> Result<(), DomainError> {
    let (qr_code_image, copy_paste_key) = match &payment.pix {
        Some(pix) => (Some(&pix.qr_code_image), Some(&pix.copy_paste_key)),
        None => (None, None),
    };

    sqlx::query(
        r#"
        INSERT INTO asaas_payments (
            id, provider_payment_id, subscription_id, provider_subscription_id,
            provider_customer_id, value_cents, status, billing_type, due_date,
            invoice_url, pix_qr_code_image, pix_copy_paste_key, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        ON CONFLICT (provider_payment_id) DO NOTHING
        "#,
    )
    .bind(payment.id.as_uuid())
    .bind(&payment.provider_payment_id)
    .bind(payment.subscription_id.as_uuid())
    .bind(&payment.provider_subscription_id)
    .bind(&payment.provider_customer_id)
    .bind(payment.value.cents())
    .bind(payment.status.as_str())
    .bind(payment.billing_type.as_str())
    .bind(payment.due_date)
    .bind(&payment.invoice_url)
    .bind(qr_code_image)
    .bind(copy_paste_key)
    .bind(payment.created_at.as_datetime())
    .bind(payment.updated_at.as_datetime())
    .execute(&mut *conn)
    .await
    .map_err(|e| query_failed("insert payment", e))?;

    Ok(())
}

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    async fn find_by_provider_id(
        &self,
        provider_payment_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        let sql = format!(
            "SELECT {} FROM asaas_payments p WHERE p.provider_payment_id = $1",
            PAYMENT_COLUMNS
        );
        let row: Option<PaymentRow> = sqlx::query_as(&sql)
            .bind(provider_payment_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_failed("fetch payment", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_for_user(
        &self,
        user_id: &UserId,
        provider_payment_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        let sql = format!(
            r#"
            SELECT {} FROM asaas_payments p
            JOIN subscriptions s ON s.id = p.subscription_id
            WHERE p.provider_payment_id = $1 AND s.user_id = $2
            "#,
            PAYMENT_COLUMNS
        );
        let row: Option<PaymentRow> = sqlx::query_as(&sql)
            .bind(provider_payment_id)
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_failed("fetch payment", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn list_for_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<Payment>, DomainError> {
        let sql = format!(
            r#"
            SELECT {} FROM asaas_payments p
            WHERE p.subscription_id = $1
            ORDER BY p.due_date ASC, p.created_at ASC
            "#,
            PAYMENT_COLUMNS
        );
        let rows: Vec<PaymentRow> = sqlx::query_as(&sql)
            .bind(subscription_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_failed("list payments", e))?;

        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn latest_for_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Option<Payment>, DomainError> {
        let sql = format!(
            r#"
            SELECT {} FROM asaas_payments p
            WHERE p.subscription_id = $1
            ORDER BY p.due_date DESC, p.created_at DESC
            LIMIT 1
            "#,
            PAYMENT_COLUMNS
        );
        let row: Option<PaymentRow> = sqlx::query_as(&sql)
            .bind(subscription_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_failed("fetch latest payment", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn insert(&self, payment: &Payment) -> Result<(), DomainError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| query_failed("acquire connection", e))?;
        insert_payment(&mut conn, payment).await
    }

    async fn update(&self, payment: &Payment) -> Result<(), DomainError> {
        let (qr_code_image, copy_paste_key) = match &payment.pix {
            Some(pix) => (Some(&pix.qr_code_image), Some(&pix.copy_paste_key)),
            None => (None, None),
        };

        let result = sqlx::query(
            r#"
            UPDATE asaas_payments SET
                status = $2,
                invoice_url = $3,
                pix_qr_code_image = $4,
                pix_copy_paste_key = $5,
                updated_at = $6
            WHERE provider_payment_id = $1
            "#,
        )
        .bind(&payment.provider_payment_id)
        .bind(payment.status.as_str())
        .bind(&payment.invoice_url)
        .bind(qr_code_image)
        .bind(copy_paste_key)
        .bind(payment.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("update payment", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(
                ErrorCode::PaymentNotFound,
                "Payment",
                &payment.provider_payment_id,
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> PaymentRow {
        PaymentRow {
            id: Uuid::new_v4(),
            provider_payment_id: "pay_1".to_string(),
            subscription_id: Uuid::new_v4(),
            provider_subscription_id: "sub_asaas_1".to_string(),
            provider_customer_id: "cus_asaas_1".to_string(),
            value_cents: 4990,
            status: "PENDING".to_string(),
            billing_type: "PIX".to_string(),
            due_date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            invoice_url: Some("https://asaas.com/i/pay_1".to_string()),
            pix_qr_code_image: Some("iVBORw0KGgo=".to_string()),
            pix_copy_paste_key: Some("00020126...".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn row_converts_with_pix() {
        let payment = Payment::try_from(row()).unwrap();

        assert_eq!(payment.value.cents(), 4990);
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(payment.awaits_pix_payment());
        assert_eq!(payment.pix.unwrap().copy_paste_key, "00020126...");
    }

    #[test]
    fn half_stored_pix_reads_as_none() {
        let payment = Payment::try_from(PaymentRow {
            pix_copy_paste_key: None,
            ..row()
        })
        .unwrap();

        assert!(payment.pix.is_none());
    }

    #[test]
    fn unknown_status_survives() {
        let payment = Payment::try_from(PaymentRow {
            status: "PARTIALLY_REFUNDED".to_string(),
            ..row()
        })
        .unwrap();

        assert_eq!(payment.status.as_str(), "PARTIALLY_REFUNDED");
    }

    #[test]
    fn negative_value_is_corrupt() {
        let err = Payment::try_from(PaymentRow {
            value_cents: -1,
            ..row()
        })
        .unwrap_err();

        assert_eq!(err.code, ErrorCode::DatabaseError);
    }
}
