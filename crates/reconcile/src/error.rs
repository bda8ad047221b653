//! Error types for the reconciliation core

use thiserror::Error;

/// Errors produced while reconciling a webhook event
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The event payload lacks the identifier the operation is keyed on.
    /// Raised before any store access, so a rejected event mutates nothing.
    #[error("payload is missing required identifier: {0}")]
    MissingIdentifier(&'static str),

    /// The event payload could not be interpreted at all (e.g. `data.object`
    /// is not a JSON object). Per-field shape problems are not errors: the
    /// offending field is skipped with a warning and the rest still applies.
    #[error("invalid event payload: {0}")]
    InvalidPayload(String),

    /// The persistence collaborator failed
    #[error("store error: {0}")]
    Store(String),
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;
