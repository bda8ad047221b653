//! Subscription reconciliation
//!
//! Merges an event's partial payload into the durable subscription record.
//! Knowledge only accumulates: a field absent from the payload never blanks
//! a stored value, so replayed and partial deliveries converge instead of
//! erasing state.

use std::sync::Arc;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::clock::Clock;
use crate::error::{ReconcileError, ReconcileResult};
use crate::event::{CheckoutSessionPayload, PreviousAttributes, SubscriptionPayload};
use crate::record::SubscriptionRecord;
use crate::store::SubscriptionStore;

/// Metadata key stamped when a renewal is detected
pub const LAST_RENEWED_METADATA_KEY: &str = "litestripe.stripesubscription.last_renewed";

pub struct ReconciliationEngine {
    store: Arc<dyn SubscriptionStore>,
    clock: Arc<dyn Clock>,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn SubscriptionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Merge a `customer.subscription.*` payload into the record keyed by
    /// `payload.id`, creating the record on first sight.
    ///
    /// Renewal detection compares `previous_attributes.cancel_at` against
    /// the record's stored `cancel_at` *before* this event's updates are
    /// applied: a match means the previously scheduled cancellation was
    /// rescinded, and both cancellation fields are cleared no matter what
    /// the payload carries for them. The comparison is only correct when
    /// events for one subscription arrive in provider-delivery order;
    /// out-of-order redelivery can produce a false renewal, and this
    /// implementation assumes per-subscription ordering rather than
    /// compensating for it.
    pub async fn reconcile(
        &self,
        event_type: &str,
        payload: &SubscriptionPayload,
        previous: Option<&PreviousAttributes>,
    ) -> ReconcileResult<SubscriptionRecord> {
        let subscription_id = payload
            .id
            .as_deref()
            .ok_or(ReconcileError::MissingIdentifier("data.object.id"))?;

        let mut record = self.store.get_or_create(subscription_id).await?;

        let is_renewed = detect_renewal(&record, previous);

        if let Some(customer) = &payload.customer {
            record.stripe_customer_id = Some(customer.clone());
        }
        if let Some(ts) = payload.created {
            if let Some(dt) = to_datetime("created", ts) {
                record.created = Some(dt);
            }
        }
        if let Some(ts) = payload.start_date {
            if let Some(dt) = to_datetime("start_date", ts) {
                record.start_date = Some(dt);
            }
        }

        // A detected renewal wins over whatever cancellation data this event
        // carries; stale cancel timestamps must not survive it.
        if is_renewed {
            record.cancel_at = None;
            record.cancelled_at = None;
        } else {
            if let Some(ts) = payload.cancel_at {
                if let Some(dt) = to_datetime("cancel_at", ts) {
                    record.cancel_at = Some(dt);
                }
            }
            if let Some(ts) = payload.canceled_at {
                if let Some(dt) = to_datetime("canceled_at", ts) {
                    record.cancelled_at = Some(dt);
                }
            }
        }

        if let Some(flag) = payload.cancel_at_period_end {
            record.cancel_at_period_end = Some(flag);
        }
        if let Some(status) = &payload.status {
            record.status = Some(status.clone());
        }

        for (key, value) in &payload.metadata {
            record.set_metadata(&format!("{event_type}.{key}"), value.clone());
        }

        if is_renewed {
            let now = self.clock.now();
            let stamp = now.format(&Rfc3339).unwrap_or_else(|_| now.to_string());
            record.set_metadata(LAST_RENEWED_METADATA_KEY, serde_json::Value::String(stamp));
            tracing::info!(
                event_type = event_type,
                subscription_id = %record.stripe_subscription_id,
                "Renewal detected, scheduled cancellation cleared"
            );
        }

        record.dt_last_updated = self.clock.now();
        self.store.save(&record).await?;

        tracing::info!(
            event_type = event_type,
            subscription_id = %record.stripe_subscription_id,
            status = ?record.status,
            "Subscription event reconciled"
        );

        Ok(record)
    }

    /// Restricted pass for checkout completion: correlation and creation
    /// fields plus namespaced metadata only. Checkout events never carry
    /// `previous_attributes`, so no renewal logic runs here.
    pub async fn reconcile_checkout(
        &self,
        event_type: &str,
        session: &CheckoutSessionPayload,
    ) -> ReconcileResult<SubscriptionRecord> {
        let subscription_id = session
            .subscription
            .as_deref()
            .ok_or(ReconcileError::MissingIdentifier("data.object.subscription"))?;

        let mut record = self.store.get_or_create(subscription_id).await?;

        if let Some(customer) = &session.customer {
            record.stripe_customer_id = Some(customer.clone());
        }
        if let Some(reference) = &session.client_reference_id {
            record.client_reference_id = Some(reference.clone());
        }
        if let Some(ts) = session.created {
            if let Some(dt) = to_datetime("created", ts) {
                record.created = Some(dt);
            }
        }

        for (key, value) in &session.metadata {
            record.set_metadata(&format!("{event_type}.{key}"), value.clone());
        }

        record.dt_last_updated = self.clock.now();
        self.store.save(&record).await?;

        tracing::info!(
            event_type = event_type,
            subscription_id = %record.stripe_subscription_id,
            client_reference_id = ?record.client_reference_id,
            "Checkout session reconciled"
        );

        Ok(record)
    }
}

/// The previous `cancel_at` matching the stored one means the cancellation
/// was rescinded by this event. Must run against the pre-update record; a
/// redelivery after the first application sees `cancel_at = None` and does
/// not fire again.
fn detect_renewal(record: &SubscriptionRecord, previous: Option<&PreviousAttributes>) -> bool {
    let Some(prev_ts) = previous.and_then(|p| p.cancel_at) else {
        return false;
    };
    let Some(prev_cancel_at) = to_datetime("previous_attributes.cancel_at", prev_ts) else {
        return false;
    };
    record.cancel_at == Some(prev_cancel_at)
}

/// Convert a Unix timestamp to a UTC instant. Zero is a real value (the
/// epoch); an out-of-range value fails closed, skipping that field update
/// while the rest of the event still applies.
fn to_datetime(field: &str, timestamp: i64) -> Option<OffsetDateTime> {
    match OffsetDateTime::from_unix_timestamp(timestamp) {
        Ok(dt) => Some(dt),
        Err(_) => {
            tracing::warn!(
                field = field,
                timestamp = timestamp,
                "timestamp out of range, skipping field update"
            );
            None
        }
    }
}
