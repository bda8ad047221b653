//! Application state

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use litestripe_reconcile::{
    default_registry, Dispatcher, OrphanRecorder, PgStore, ReconciliationEngine, SystemClock,
};

use crate::config::Config;
use crate::signature::SignatureVerifier;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub dispatcher: Arc<Dispatcher>,
    pub verifier: Arc<SignatureVerifier>,
    pub webhook_endpoint_id: Uuid,
}

impl AppState {
    /// Wire the reconciliation core: store and clock into the engine and
    /// orphan recorder, handlers into the registry, registry into the
    /// dispatcher. Registration happens exactly once, here.
    pub fn new(pool: PgPool, config: &Config) -> Self {
        let store = Arc::new(PgStore::new(pool.clone()));
        let clock = Arc::new(SystemClock);

        let engine = Arc::new(ReconciliationEngine::new(store.clone(), clock));
        let orphans = Arc::new(OrphanRecorder::new(store));
        let registry = default_registry(engine, orphans);
        tracing::info!(
            event_types = registry.registered_types(),
            "Webhook handler registry assembled"
        );

        Self {
            pool,
            dispatcher: Arc::new(Dispatcher::new(Arc::new(registry))),
            verifier: Arc::new(SignatureVerifier::new(&config.webhook_secret)),
            webhook_endpoint_id: config.webhook_endpoint_id,
        }
    }
}
