//! Handler registry
//!
//! Maps an event-type string to an ordered list of handlers. The registry is
//! assembled once at process start (see `handlers::default_registry`) and is
//! read-only afterwards; there is no removal operation.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ReconcileResult;
use crate::event::WebhookEvent;

/// A registered procedure invoked when an event of its subscribed type arrives
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    /// Stable name used in reports and logs
    fn name(&self) -> &str;

    async fn handle(&self, event: &WebhookEvent) -> ReconcileResult<()>;
}

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Vec<Arc<dyn EventHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to the list for `event_type`, creating the list if
    /// absent. Multiple registrations for the same type are preserved in
    /// registration order and all are invoked.
    pub fn register(&mut self, event_type: &str, handler: Arc<dyn EventHandler>) {
        self.handlers
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
    }

    /// Handlers for `event_type`, in registration order; empty for unknown
    /// types (not an error)
    pub fn lookup(&self, event_type: &str) -> &[Arc<dyn EventHandler>] {
        self.handlers
            .get(event_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of distinct event types with at least one handler
    pub fn registered_types(&self) -> usize {
        self.handlers.len()
    }
}
