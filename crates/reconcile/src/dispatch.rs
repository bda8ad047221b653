//! Event dispatch
//!
//! The entry point for a verified event: look up its handlers, invoke every
//! one in order, and report per-handler outcomes. A handler failure never
//! stops its siblings and never fails the dispatch as a whole — the upstream
//! provider redelivers on non-2xx responses, so a permanently-failing
//! handler must not turn one bad event into an unbounded redelivery storm.
//! Failure detail is surfaced in the report and the log stream only.

use std::sync::Arc;

use crate::event::WebhookEvent;
use crate::registry::HandlerRegistry;

/// Outcome of one handler invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(String),
}

/// One entry per invoked handler, in invocation order
#[derive(Debug, Clone)]
pub struct HandlerOutcome {
    pub handler: String,
    pub outcome: Outcome,
}

/// Aggregate result of dispatching a single event
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub event_id: String,
    pub event_type: String,
    pub outcomes: Vec<HandlerOutcome>,
}

impl DispatchReport {
    /// True when at least one handler was registered for the event type
    pub fn was_handled(&self) -> bool {
        !self.outcomes.is_empty()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Failure(_)))
            .count()
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.len() - self.failure_count()
    }
}

pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    /// Dispatch one event to every handler registered for its type.
    ///
    /// Infallible by design: individual handler errors are captured in the
    /// report, and an event with no registered handlers is acknowledged with
    /// an empty report (logged, so unhandled types can be spotted).
    pub async fn dispatch(&self, event: &WebhookEvent) -> DispatchReport {
        let handlers = self.registry.lookup(&event.event_type);

        if handlers.is_empty() {
            tracing::warn!(
                event_id = %event.id,
                event_type = %event.event_type,
                "No handlers registered for event type"
            );
            return DispatchReport {
                event_id: event.id.clone(),
                event_type: event.event_type.clone(),
                outcomes: Vec::new(),
            };
        }

        let mut outcomes = Vec::with_capacity(handlers.len());
        for handler in handlers {
            match handler.handle(event).await {
                Ok(()) => {
                    tracing::info!(
                        event_id = %event.id,
                        event_type = %event.event_type,
                        handler = handler.name(),
                        "Handler completed"
                    );
                    outcomes.push(HandlerOutcome {
                        handler: handler.name().to_string(),
                        outcome: Outcome::Success,
                    });
                }
                Err(e) => {
                    tracing::error!(
                        event_id = %event.id,
                        event_type = %event.event_type,
                        handler = handler.name(),
                        error = %e,
                        "Handler failed; continuing with remaining handlers"
                    );
                    outcomes.push(HandlerOutcome {
                        handler: handler.name().to_string(),
                        outcome: Outcome::Failure(e.to_string()),
                    });
                }
            }
        }

        DispatchReport {
            event_id: event.id.clone(),
            event_type: event.event_type.clone(),
            outcomes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ReconcileError, ReconcileResult};
    use crate::registry::EventHandler;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingHandler {
        name: &'static str,
        calls: AtomicU32,
        fail: bool,
    }

    impl CountingHandler {
        fn new(name: &'static str, fail: bool) -> Self {
            Self {
                name,
                calls: AtomicU32::new(0),
                fail,
            }
        }
    }

    #[async_trait::async_trait]
    impl EventHandler for CountingHandler {
        fn name(&self) -> &str {
            self.name
        }

        async fn handle(&self, _event: &WebhookEvent) -> ReconcileResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ReconcileError::InvalidPayload("simulated failure".into()))
            } else {
                Ok(())
            }
        }
    }

    fn test_event(event_type: &str) -> WebhookEvent {
        serde_json::from_value(json!({
            "id": "evt_test_1",
            "type": event_type,
            "data": {"object": {"id": "sub_test_1"}}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_no_handlers_is_acknowledged() {
        let dispatcher = Dispatcher::new(Arc::new(HandlerRegistry::new()));
        let report = dispatcher.dispatch(&test_event("some.unknown.event")).await;

        assert!(!report.was_handled());
        assert_eq!(report.failure_count(), 0);
        assert_eq!(report.event_type, "some.unknown.event");
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_later_handlers() {
        let failing = Arc::new(CountingHandler::new("failing", true));
        let succeeding = Arc::new(CountingHandler::new("succeeding", false));

        let mut registry = HandlerRegistry::new();
        registry.register("a.b", failing.clone());
        registry.register("a.b", succeeding.clone());

        let dispatcher = Dispatcher::new(Arc::new(registry));
        let report = dispatcher.dispatch(&test_event("a.b")).await;

        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(succeeding.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.success_count(), 1);
        assert!(matches!(report.outcomes[0].outcome, Outcome::Failure(_)));
        assert_eq!(report.outcomes[1].outcome, Outcome::Success);
    }

    #[tokio::test]
    async fn test_outcomes_follow_registration_order() {
        let mut registry = HandlerRegistry::new();
        registry.register("a.b", Arc::new(CountingHandler::new("first", false)));
        registry.register("a.b", Arc::new(CountingHandler::new("second", false)));

        let dispatcher = Dispatcher::new(Arc::new(registry));
        let report = dispatcher.dispatch(&test_event("a.b")).await;

        let names: Vec<&str> = report.outcomes.iter().map(|o| o.handler.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }
}
