//! Webhook event envelope and typed payload projections
//!
//! Stripe delivers events as a generic envelope whose `data.object` shape
//! depends on the event type. The projections here are built by explicit
//! per-field extraction rather than blanket deserialization: the merge
//! algorithm depends on telling "field not sent" apart from "field sent as
//! zero", and a single malformed field must not reject the whole payload.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ReconcileError, ReconcileResult};

/// Event-type strings this system registers handlers for
pub mod event_types {
    pub const SUBSCRIPTION_CREATED: &str = "customer.subscription.created";
    pub const SUBSCRIPTION_UPDATED: &str = "customer.subscription.updated";
    pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
}

/// A single verified provider notification
///
/// Immutable once received. Delivery is not guaranteed unique: the same
/// event id may arrive more than once and reconciliation must converge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Unique identifier for the event (`evt_...`)
    pub id: String,

    /// Event-type string, e.g. `customer.subscription.updated`
    #[serde(rename = "type")]
    pub event_type: String,

    /// Object containing event data
    pub data: EventData,
}

/// Event data container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    /// The actual event object (subscription, checkout session, ...)
    pub object: Value,

    /// Previous values for updated fields (only in `*.updated` events)
    #[serde(default)]
    pub previous_attributes: Option<Value>,
}

impl WebhookEvent {
    /// Parse from raw JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> ReconcileResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| ReconcileError::InvalidPayload(e.to_string()))
    }

    /// Project `data.object` as a subscription payload
    pub fn subscription_payload(&self) -> ReconcileResult<SubscriptionPayload> {
        SubscriptionPayload::from_object(&self.data.object)
    }

    /// Project `data.previous_attributes`, if any
    pub fn previous_attributes(&self) -> Option<PreviousAttributes> {
        PreviousAttributes::from_value(self.data.previous_attributes.as_ref()?)
    }

    /// Project `data.object` as a checkout session payload
    pub fn checkout_session_payload(&self) -> ReconcileResult<CheckoutSessionPayload> {
        CheckoutSessionPayload::from_object(&self.data.object)
    }
}

/// Partially-optional projection of a `customer.subscription.*` object
///
/// Every field is optional: an absent field means "no new knowledge" and
/// leaves the stored value untouched during the merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionPayload {
    pub id: Option<String>,
    pub customer: Option<String>,
    pub status: Option<String>,
    /// Unix timestamps; `Some(0)` is a real value (the epoch), not "unset"
    pub created: Option<i64>,
    pub start_date: Option<i64>,
    pub cancel_at: Option<i64>,
    pub canceled_at: Option<i64>,
    pub cancel_at_period_end: Option<bool>,
    pub metadata: BTreeMap<String, Value>,
}

impl SubscriptionPayload {
    pub fn from_object(object: &Value) -> ReconcileResult<Self> {
        let object = require_object(object)?;
        Ok(Self {
            id: string_field(object, "id"),
            customer: string_field(object, "customer"),
            status: string_field(object, "status"),
            created: timestamp_field(object, "created"),
            start_date: timestamp_field(object, "start_date"),
            cancel_at: timestamp_field(object, "cancel_at"),
            canceled_at: timestamp_field(object, "canceled_at"),
            cancel_at_period_end: bool_field(object, "cancel_at_period_end"),
            metadata: metadata_field(object),
        })
    }
}

/// The slice of `previous_attributes` the renewal check cares about
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviousAttributes {
    pub cancel_at: Option<i64>,
}

impl PreviousAttributes {
    /// Returns `None` for a non-object value (treated as absent, with a warning)
    pub fn from_value(value: &Value) -> Option<Self> {
        let Some(object) = value.as_object() else {
            tracing::warn!(
                value_type = json_type_name(value),
                "previous_attributes is not an object, ignoring"
            );
            return None;
        };
        Some(Self {
            cancel_at: timestamp_field(object, "cancel_at"),
        })
    }
}

/// Partially-optional projection of a `checkout.session.completed` object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckoutSessionPayload {
    /// The Stripe subscription id the session created, if any
    pub subscription: Option<String>,
    pub customer: Option<String>,
    pub client_reference_id: Option<String>,
    pub customer_email: Option<String>,
    pub created: Option<i64>,
    pub metadata: BTreeMap<String, Value>,
}

impl CheckoutSessionPayload {
    pub fn from_object(object: &Value) -> ReconcileResult<Self> {
        let object = require_object(object)?;

        // Newer API versions carry the email under customer_details
        let customer_email = object
            .get("customer_details")
            .and_then(|d| d.as_object())
            .and_then(|d| string_field(d, "email"))
            .or_else(|| string_field(object, "customer_email"));

        Ok(Self {
            subscription: string_field(object, "subscription"),
            customer: string_field(object, "customer"),
            client_reference_id: string_field(object, "client_reference_id"),
            customer_email,
            created: timestamp_field(object, "created"),
            metadata: metadata_field(object),
        })
    }
}

type JsonObject = serde_json::Map<String, Value>;

fn require_object(value: &Value) -> ReconcileResult<&JsonObject> {
    value.as_object().ok_or_else(|| {
        ReconcileError::InvalidPayload(format!(
            "data.object is {}, expected a JSON object",
            json_type_name(value)
        ))
    })
}

/// Absent and JSON-null both mean "not sent"; an empty string is treated the
/// same since the provider never sends meaningful empty ids.
fn string_field(object: &JsonObject, key: &str) -> Option<String> {
    match object.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            warn_skipped(key, other, "string");
            None
        }
    }
}

/// Extract a Unix timestamp, preserving the distinction between absent/null
/// (`None`) and an explicit zero (`Some(0)`). A non-numeric value fails
/// closed: the field is skipped with a warning and the rest of the payload
/// still applies.
fn timestamp_field(object: &JsonObject, key: &str) -> Option<i64> {
    match object.get(key) {
        None | Some(Value::Null) => None,
        Some(value) => match value.as_i64() {
            Some(ts) => Some(ts),
            None => {
                warn_skipped(key, value, "integer timestamp");
                None
            }
        },
    }
}

fn bool_field(object: &JsonObject, key: &str) -> Option<bool> {
    match object.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::Bool(b)) => Some(*b),
        Some(other) => {
            warn_skipped(key, other, "boolean");
            None
        }
    }
}

/// `metadata` is a flat object of caller-supplied keys; a missing or
/// wrong-typed metadata field yields an empty map.
fn metadata_field(object: &JsonObject) -> BTreeMap<String, Value> {
    match object.get("metadata") {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        Some(other) => {
            warn_skipped("metadata", other, "object");
            BTreeMap::new()
        }
    }
}

fn warn_skipped(key: &str, value: &Value, expected: &str) {
    tracing::warn!(
        field = key,
        value_type = json_type_name(value),
        expected = expected,
        "skipping malformed payload field"
    );
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_subscription_event() {
        let raw = r#"{
            "id": "evt_1234567890",
            "type": "customer.subscription.updated",
            "data": {
                "object": {
                    "id": "sub_1234567890",
                    "customer": "cus_1234567890",
                    "status": "active",
                    "created": 1614556800,
                    "cancel_at_period_end": false,
                    "metadata": {"plan": "pro"}
                },
                "previous_attributes": {
                    "cancel_at": 1700000000
                }
            }
        }"#;

        let event = WebhookEvent::from_bytes(raw.as_bytes()).unwrap();
        assert_eq!(event.id, "evt_1234567890");
        assert_eq!(event.event_type, event_types::SUBSCRIPTION_UPDATED);

        let payload = event.subscription_payload().unwrap();
        assert_eq!(payload.id.as_deref(), Some("sub_1234567890"));
        assert_eq!(payload.status.as_deref(), Some("active"));
        assert_eq!(payload.created, Some(1614556800));
        assert_eq!(payload.cancel_at_period_end, Some(false));
        assert_eq!(payload.metadata.get("plan"), Some(&json!("pro")));

        let previous = event.previous_attributes().unwrap();
        assert_eq!(previous.cancel_at, Some(1700000000));
    }

    #[test]
    fn test_absent_null_and_zero_are_distinct() {
        let object = json!({
            "id": "sub_1",
            "start_date": null,
            "cancel_at": 0
        });

        let payload = SubscriptionPayload::from_object(&object).unwrap();
        assert_eq!(payload.created, None, "absent field is None");
        assert_eq!(payload.start_date, None, "explicit null is None");
        assert_eq!(payload.cancel_at, Some(0), "explicit zero is preserved");
    }

    #[test]
    fn test_malformed_field_is_skipped_not_fatal() {
        let object = json!({
            "id": "sub_1",
            "created": "not-a-number",
            "status": 42,
            "cancel_at_period_end": "yes",
            "cancel_at": 1700000000
        });

        let payload = SubscriptionPayload::from_object(&object).unwrap();
        assert_eq!(payload.created, None);
        assert_eq!(payload.status, None);
        assert_eq!(payload.cancel_at_period_end, None);
        // The well-formed field still made it through
        assert_eq!(payload.cancel_at, Some(1700000000));
    }

    #[test]
    fn test_non_object_payload_rejected() {
        let err = SubscriptionPayload::from_object(&json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidPayload(_)));
    }

    #[test]
    fn test_checkout_session_email_fallback() {
        let with_details = json!({
            "subscription": "sub_1",
            "customer_details": {"email": "a@example.com"},
            "customer_email": "b@example.com"
        });
        let payload = CheckoutSessionPayload::from_object(&with_details).unwrap();
        assert_eq!(payload.customer_email.as_deref(), Some("a@example.com"));

        let legacy = json!({"customer_email": "b@example.com"});
        let payload = CheckoutSessionPayload::from_object(&legacy).unwrap();
        assert_eq!(payload.customer_email.as_deref(), Some("b@example.com"));
    }

    #[test]
    fn test_previous_attributes_non_object_ignored() {
        assert!(PreviousAttributes::from_value(&json!("oops")).is_none());
        assert_eq!(
            PreviousAttributes::from_value(&json!({"cancel_at": 5})),
            Some(PreviousAttributes {
                cancel_at: Some(5)
            })
        );
    }
}
