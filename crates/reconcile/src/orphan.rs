//! Orphaned-payment fallback
//!
//! A paying customer must never be silently lost. When a checkout event
//! cannot be correlated to a subscription, the raw event is stashed for a
//! human to reconcile; that is the only retry path for this case.

use std::sync::Arc;

use crate::error::{ReconcileError, ReconcileResult};
use crate::event::WebhookEvent;
use crate::record::{NewOrphanedPayment, OrphanedPayment};
use crate::store::SubscriptionStore;

pub struct OrphanRecorder {
    store: Arc<dyn SubscriptionStore>,
}

impl OrphanRecorder {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    /// Unconditionally append an orphan record carrying the full raw event.
    /// No lookup, no merge; every detected occurrence produces one record.
    pub async fn record(
        &self,
        event: &WebhookEvent,
        stripe_customer_id: Option<String>,
        customer_email: Option<String>,
        reason: &str,
    ) -> ReconcileResult<OrphanedPayment> {
        let raw = serde_json::to_value(event)
            .map_err(|e| ReconcileError::InvalidPayload(e.to_string()))?;

        let orphan = self
            .store
            .create_orphan(NewOrphanedPayment {
                stripe_customer_id,
                customer_email,
                event: raw,
                reason: reason.to_string(),
            })
            .await?;

        tracing::error!(
            event_id = %event.id,
            event_type = %event.event_type,
            orphan_id = %orphan.id,
            reason = reason,
            "CRITICAL: orphaned payment recorded, manual reconciliation required"
        );

        Ok(orphan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_every_occurrence_appends_a_record() {
        let store = Arc::new(MemoryStore::new());
        let recorder = OrphanRecorder::new(store.clone());

        let event: WebhookEvent = serde_json::from_value(json!({
            "id": "evt_orphan",
            "type": "checkout.session.completed",
            "data": {"object": {"customer": "cus_1"}}
        }))
        .unwrap();

        recorder
            .record(
                &event,
                Some("cus_1".into()),
                Some("x@example.com".into()),
                "missing subscription id",
            )
            .await
            .unwrap();
        recorder
            .record(&event, Some("cus_1".into()), None, "missing subscription id")
            .await
            .unwrap();

        let orphans = store.orphans().await;
        assert_eq!(orphans.len(), 2, "no dedup on orphan records");
        assert_eq!(orphans[0].reason, "missing subscription id");
        assert_eq!(orphans[0].event["id"], json!("evt_orphan"));
        assert_eq!(orphans[0].customer_email.as_deref(), Some("x@example.com"));
    }
}
