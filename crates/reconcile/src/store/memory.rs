//! In-memory store
//!
//! Used by tests and local experimentation. The single mutex gives the
//! per-key atomicity the trait requires.

use std::collections::HashMap;

use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::ReconcileResult;
use crate::record::{NewOrphanedPayment, OrphanedPayment, SubscriptionRecord};
use crate::store::SubscriptionStore;

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    subscriptions: HashMap<String, SubscriptionRecord>,
    orphans: Vec<OrphanedPayment>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current record for an id, if any (test inspection)
    pub async fn get(&self, stripe_subscription_id: &str) -> Option<SubscriptionRecord> {
        self.inner
            .lock()
            .await
            .subscriptions
            .get(stripe_subscription_id)
            .cloned()
    }

    pub async fn subscription_count(&self) -> usize {
        self.inner.lock().await.subscriptions.len()
    }

    pub async fn orphans(&self) -> Vec<OrphanedPayment> {
        self.inner.lock().await.orphans.clone()
    }
}

#[async_trait::async_trait]
impl SubscriptionStore for MemoryStore {
    async fn get_or_create(
        &self,
        stripe_subscription_id: &str,
    ) -> ReconcileResult<SubscriptionRecord> {
        let mut inner = self.inner.lock().await;
        let record = inner
            .subscriptions
            .entry(stripe_subscription_id.to_string())
            .or_insert_with(|| {
                SubscriptionRecord::new(stripe_subscription_id, OffsetDateTime::now_utc())
            });
        Ok(record.clone())
    }

    async fn save(&self, record: &SubscriptionRecord) -> ReconcileResult<()> {
        let mut inner = self.inner.lock().await;
        inner
            .subscriptions
            .insert(record.stripe_subscription_id.clone(), record.clone());
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
        self.inner.lock().await.orphans.push(stored.clone());
        Ok(stored)
    }
}
