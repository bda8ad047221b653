//! Durable record types
//!
//! `SubscriptionRecord` is the reconciled projection of a subscription's
//! lifecycle: exactly one exists per `stripe_subscription_id`, created empty
//! on first sight and filled incrementally as events arrive. Fields only
//! accumulate; an event that omits a field never blanks a stored value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

/// Reconciled subscription state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub id: Uuid,
    /// External identity; the reconciliation key
    pub stripe_subscription_id: String,
    pub stripe_customer_id: Option<String>,
    /// Opaque reference tying the subscription back to an internal identity
    pub client_reference_id: Option<String>,
    pub created: Option<OffsetDateTime>,
    pub start_date: Option<OffsetDateTime>,
    pub cancel_at: Option<OffsetDateTime>,
    pub cancelled_at: Option<OffsetDateTime>,
    pub cancel_at_period_end: Option<bool>,
    /// Lifecycle label as reported by the provider; pass-through, not validated
    pub status: Option<String>,
    /// Accumulated metadata under namespaced keys (`"<event_type>.<key>"`),
    /// overwritten per exact key only, never deleted
    pub metadata: BTreeMap<String, Value>,
    pub dt_created: OffsetDateTime,
    pub dt_last_updated: OffsetDateTime,
}

impl SubscriptionRecord {
    /// A fresh record known only by its subscription id
    pub fn new(stripe_subscription_id: &str, now: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            stripe_subscription_id: stripe_subscription_id.to_string(),
            stripe_customer_id: None,
            client_reference_id: None,
            created: None,
            start_date: None,
            cancel_at: None,
            cancelled_at: None,
            cancel_at_period_end: None,
            status: None,
            metadata: BTreeMap::new(),
            dt_created: now,
            dt_last_updated: now,
        }
    }

    /// Set a metadata value, overwriting any prior value at that exact key
    pub fn set_metadata(&mut self, key: &str, value: Value) {
        self.metadata.insert(key.to_string(), value);
    }

    /// Retrieve a specific metadata key
    pub fn metadata_key(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }
}

/// A payment-related event that could not be correlated to a subscription
///
/// Append-only: created once per detected occurrence, never updated,
/// retained indefinitely for manual reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrphanedPayment {
    pub id: Uuid,
    pub stripe_customer_id: Option<String>,
    pub customer_email: Option<String>,
    /// The raw event, preserved in full for recovery
    pub event: Value,
    pub reason: String,
    pub created_at: OffsetDateTime,
}

/// Input for recording an orphaned payment
#[derive(Debug, Clone)]
pub struct NewOrphanedPayment {
    pub stripe_customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub event: Value,
    pub reason: String,
}
