//! Postgres store
//!
//! Lookup-or-create uses `INSERT .. ON CONFLICT DO NOTHING` followed by a
//! read, so two concurrent deliveries for the same subscription id converge
//! on one row. Metadata lives in memory as a typed map and is serialized to
//! JSONB only here, at the storage boundary.

use std::collections::BTreeMap;

use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{ReconcileError, ReconcileResult};
use crate::record::{NewOrphanedPayment, OrphanedPayment, SubscriptionRecord};
use crate::store::SubscriptionStore;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    stripe_subscription_id: String,
    stripe_customer_id: Option<String>,
    client_reference_id: Option<String>,
    created: Option<OffsetDateTime>,
    start_date: Option<OffsetDateTime>,
    cancel_at: Option<OffsetDateTime>,
    cancelled_at: Option<OffsetDateTime>,
    cancel_at_period_end: Option<bool>,
    status: Option<String>,
    metadata: serde_json::Value,
    dt_created: OffsetDateTime,
    dt_last_updated: OffsetDateTime,
}

impl From<SubscriptionRow> for SubscriptionRecord {
    fn from(row: SubscriptionRow) -> Self {
        let metadata: BTreeMap<String, serde_json::Value> = row
            .metadata
            .as_object()
            .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        Self {
            id: row.id,
            stripe_subscription_id: row.stripe_subscription_id,
            stripe_customer_id: row.stripe_customer_id,
            client_reference_id: row.client_reference_id,
            created: row.created,
            start_date: row.start_date,
            cancel_at: row.cancel_at,
            cancelled_at: row.cancelled_at,
            cancel_at_period_end: row.cancel_at_period_end,
            status: row.status,
            metadata,
            dt_created: row.dt_created,
            dt_last_updated: row.dt_last_updated,
        }
    }
}

#[async_trait::async_trait]
impl SubscriptionStore for PgStore {
    async fn get_or_create(
        &self,
        stripe_subscription_id: &str,
    ) -> ReconcileResult<SubscriptionRecord> {
        sqlx::query(
            r#"
            INSERT INTO stripe_subscriptions
                (id, stripe_subscription_id, metadata, dt_created, dt_last_updated)
            VALUES ($1, $2, '{}'::jsonb, NOW(), NOW())
            ON CONFLICT (stripe_subscription_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(stripe_subscription_id)
        .execute(&self.pool)
        .await
        .map_err(|e| ReconcileError::Store(e.to_string()))?;

        let row: SubscriptionRow = sqlx::query_as(
            r#"
            SELECT id, stripe_subscription_id, stripe_customer_id, client_reference_id,
                   created, start_date, cancel_at, cancelled_at, cancel_at_period_end,
                   status, metadata, dt_created, dt_last_updated
            FROM stripe_subscriptions
            WHERE stripe_subscription_id = $1
            "#,
        )
        .bind(stripe_subscription_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ReconcileError::Store(e.to_string()))?;

        Ok(row.into())
    }

    async fn save(&self, record: &SubscriptionRecord) -> ReconcileResult<()> {
        let metadata = serde_json::to_value(&record.metadata)
            .map_err(|e| ReconcileError::Store(e.to_string()))?;

        sqlx::query(
            r#"
            UPDATE stripe_subscriptions
            SET stripe_customer_id = $1,
                client_reference_id = $2,
                created = $3,
                start_date = $4,
                cancel_at = $5,
                cancelled_at = $6,
                cancel_at_period_end = $7,
                status = $8,
                metadata = $9,
                dt_last_updated = $10
            WHERE stripe_subscription_id = $11
            "#,
        )
        .bind(&record.stripe_customer_id)
        .bind(&record.client_reference_id)
        .bind(record.created)
        .bind(record.start_date)
        .bind(record.cancel_at)
        .bind(record.cancelled_at)
        .bind(record.cancel_at_period_end)
        .bind(&record.status)
        .bind(metadata)
        .bind(record.dt_last_updated)
        .bind(&record.stripe_subscription_id)
        .execute(&self.pool)
        .await
        .map_err(|e| ReconcileError::Store(e.to_string()))?;

        Ok(())
    }

    async fn create_orphan(&self, orphan: NewOrphanedPayment) -> ReconcileResult<OrphanedPayment> {
        let stored = OrphanedPayment {
            id: Uuid::new_v4(),
            stripe_customer_id: orphan.stripe_customer_id,
            customer_email: orphan.customer_email,
            event: orphan.event,
            reason: orphan.reason,
            created_at: OffsetDateTime::now_utc(),
        };

        sqlx::query(
            r#"
            INSERT INTO orphaned_payments
                (id, stripe_customer_id, customer_email, event, reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(stored.id)
        .bind(&stored.stripe_customer_id)
        .bind(&stored.customer_email)
        .bind(&stored.event)
        .bind(&stored.reason)
        .bind(stored.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| ReconcileError::Store(e.to_string()))?;

        Ok(stored)
    }
}
