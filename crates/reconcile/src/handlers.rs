//! Concrete event handlers and the startup registration table

use std::sync::Arc;

use crate::engine::ReconciliationEngine;
use crate::error::ReconcileResult;
use crate::event::{event_types, WebhookEvent};
use crate::orphan::OrphanRecorder;
use crate::registry::{EventHandler, HandlerRegistry};

/// Handles `customer.subscription.created` and `customer.subscription.updated`
pub struct SubscriptionLifecycleHandler {
    engine: Arc<ReconciliationEngine>,
}

impl SubscriptionLifecycleHandler {
    pub fn new(engine: Arc<ReconciliationEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait::async_trait]
impl EventHandler for SubscriptionLifecycleHandler {
    fn name(&self) -> &str {
        "subscription_lifecycle"
    }

    async fn handle(&self, event: &WebhookEvent) -> ReconcileResult<()> {
        let payload = event.subscription_payload()?;
        let previous = event.previous_attributes();
        self.engine
            .reconcile(&event.event_type, &payload, previous.as_ref())
            .await?;
        Ok(())
    }
}

/// Handles `checkout.session.completed`
///
/// A session without a subscription id cannot be reconciled; it becomes an
/// orphaned-payment record instead of an error, so the delivery is still
/// acknowledged and a human gets a durable trail to recover from.
pub struct CheckoutCompletedHandler {
    engine: Arc<ReconciliationEngine>,
    orphans: Arc<OrphanRecorder>,
}

impl CheckoutCompletedHandler {
    pub fn new(engine: Arc<ReconciliationEngine>, orphans: Arc<OrphanRecorder>) -> Self {
        Self { engine, orphans }
    }
}

#[async_trait::async_trait]
impl EventHandler for CheckoutCompletedHandler {
    fn name(&self) -> &str {
        "checkout_completed"
    }

    async fn handle(&self, event: &WebhookEvent) -> ReconcileResult<()> {
        let session = event.checkout_session_payload()?;

        if session.subscription.is_none() {
            tracing::warn!(
                event_id = %event.id,
                "No subscription id in checkout.session.completed event"
            );
            self.orphans
                .record(
                    event,
                    session.customer.clone(),
                    session.customer_email.clone(),
                    "missing subscription id",
                )
                .await?;
            return Ok(());
        }

        self.engine
            .reconcile_checkout(&event.event_type, &session)
            .await?;
        Ok(())
    }
}

/// Assemble the standard registration table. Called once at process start;
/// the registry is read-only afterwards.
pub fn default_registry(
    engine: Arc<ReconciliationEngine>,
    orphans: Arc<OrphanRecorder>,
) -> HandlerRegistry {
    let lifecycle: Arc<dyn EventHandler> =
        Arc::new(SubscriptionLifecycleHandler::new(engine.clone()));
    let checkout: Arc<dyn EventHandler> = Arc::new(CheckoutCompletedHandler::new(engine, orphans));

    let table = [
        (event_types::SUBSCRIPTION_CREATED, lifecycle.clone()),
        (event_types::SUBSCRIPTION_UPDATED, lifecycle),
        (event_types::CHECKOUT_COMPLETED, checkout),
    ];

    let mut registry = HandlerRegistry::new();
    for (event_type, handler) in table {
        registry.register(event_type, handler);
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::MemoryStore;
    use serde_json::json;
    use time::macros::datetime;

    fn build(store: Arc<MemoryStore>) -> HandlerRegistry {
        let clock = Arc::new(FixedClock(datetime!(2024-12-07 20:50:00 UTC)));
        let engine = Arc::new(ReconciliationEngine::new(store.clone(), clock));
        let orphans = Arc::new(OrphanRecorder::new(store));
        default_registry(engine, orphans)
    }

    fn event(value: serde_json::Value) -> WebhookEvent {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_default_registry_covers_all_three_event_types() {
        let registry = build(Arc::new(MemoryStore::new()));
        assert_eq!(registry.lookup(event_types::SUBSCRIPTION_CREATED).len(), 1);
        assert_eq!(registry.lookup(event_types::SUBSCRIPTION_UPDATED).len(), 1);
        assert_eq!(registry.lookup(event_types::CHECKOUT_COMPLETED).len(), 1);
    }

    #[tokio::test]
    async fn test_checkout_without_subscription_orphans_and_succeeds() {
        let store = Arc::new(MemoryStore::new());
        let registry = build(store.clone());

        let handler = &registry.lookup(event_types::CHECKOUT_COMPLETED)[0];
        handler
            .handle(&event(json!({
                "id": "evt_1",
                "type": "checkout.session.completed",
                "data": {"object": {
                    "customer": "cus_1",
                    "customer_details": {"email": "x@example.com"}
                }}
            })))
            .await
            .unwrap();

        assert_eq!(store.orphans().await.len(), 1);
        assert_eq!(
            store.subscription_count().await,
            0,
            "orphan path must not touch subscription records"
        );
    }

    #[tokio::test]
    async fn test_checkout_with_subscription_updates_correlation_fields() {
        let store = Arc::new(MemoryStore::new());
        let registry = build(store.clone());

        let handler = &registry.lookup(event_types::CHECKOUT_COMPLETED)[0];
        handler
            .handle(&event(json!({
                "id": "evt_2",
                "type": "checkout.session.completed",
                "data": {"object": {
                    "subscription": "sub_7",
                    "customer": "cus_7",
                    "client_reference_id": "user-7",
                    "metadata": {"points_limit": 10}
                }}
            })))
            .await
            .unwrap();

        let record = store.get("sub_7").await.unwrap();
        assert_eq!(record.stripe_customer_id.as_deref(), Some("cus_7"));
        assert_eq!(record.client_reference_id.as_deref(), Some("user-7"));
        assert_eq!(
            record.metadata_key("checkout.session.completed.points_limit"),
            Some(&json!(10))
        );
        assert!(store.orphans().await.is_empty());
    }

    #[tokio::test]
    async fn test_lifecycle_handler_reconciles_updated_event() {
        let store = Arc::new(MemoryStore::new());
        let registry = build(store.clone());

        let handler = &registry.lookup(event_types::SUBSCRIPTION_UPDATED)[0];
        handler
            .handle(&event(json!({
                "id": "evt_3",
                "type": "customer.subscription.updated",
                "data": {"object": {"id": "sub_3", "status": "trialing"}}
            })))
            .await
            .unwrap();

        let record = store.get("sub_3").await.unwrap();
        assert_eq!(record.status.as_deref(), Some("trialing"));
    }
}
