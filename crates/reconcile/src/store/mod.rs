//! Persistence boundary
//!
//! The engine owns the only write path to subscription records; everything
//! it needs from storage fits in three operations. Implementations must
//! provide at-least atomic lookup-or-create semantics per subscription id —
//! two concurrent deliveries for the same id must not create two records.
//! The reconciliation algorithm is otherwise written as if single-threaded
//! per record and relies on that contract.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::error::ReconcileResult;
use crate::record::{NewOrphanedPayment, OrphanedPayment, SubscriptionRecord};

#[async_trait::async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Fetch the record for `stripe_subscription_id`, creating an empty one
    /// if none exists. Exactly one record ever exists per id.
    async fn get_or_create(&self, stripe_subscription_id: &str)
        -> ReconcileResult<SubscriptionRecord>;

    /// Persist the record's current state
    async fn save(&self, record: &SubscriptionRecord) -> ReconcileResult<()>;

    /// Append an orphaned-payment record; never merged or updated
    async fn create_orphan(&self, orphan: NewOrphanedPayment) -> ReconcileResult<OrphanedPayment>;
}
