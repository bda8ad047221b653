// Reconcile crate clippy configuration
// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Litestripe Reconciliation Core
//!
//! Turns asynchronous Stripe webhook deliveries into durable subscription
//! state records.
//!
//! ## Components
//!
//! - **Handler Registry**: routes an event-type string to one or more
//!   registered handlers, invoked in registration order
//! - **Dispatcher**: fans a verified event out to its handlers, isolating
//!   per-handler failures so the delivery is always acknowledged
//! - **Reconciliation Engine**: merges partial, out-of-order, and replayed
//!   event payloads into a single subscription record without losing
//!   previously learned state
//! - **Orphan Recorder**: stashes checkout events that cannot be correlated
//!   to a subscription, for manual recovery
//!
//! The HTTP endpoint, signature verification, and process bootstrap live in
//! the `litestripe-api` crate; this crate only ever sees verified events.

pub mod clock;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod event;
pub mod handlers;
pub mod orphan;
pub mod record;
pub mod registry;
pub mod store;


// Clock
pub use clock::{Clock, SystemClock};

// Dispatch
pub use dispatch::{DispatchReport, Dispatcher, HandlerOutcome, Outcome};

// Engine
pub use engine::ReconciliationEngine;

// Error
pub use error::{ReconcileError, ReconcileResult};

// Events
pub use event::{
    event_types, CheckoutSessionPayload, EventData, PreviousAttributes, SubscriptionPayload,
    WebhookEvent,
};

// Handlers
pub use handlers::{default_registry, CheckoutCompletedHandler, SubscriptionLifecycleHandler};

// Orphans
pub use orphan::OrphanRecorder;

// Records
pub use record::{NewOrphanedPayment, OrphanedPayment, SubscriptionRecord};

// Registry
pub use registry::{EventHandler, HandlerRegistry};

// Store
pub use store::{MemoryStore, PgStore, SubscriptionStore};
