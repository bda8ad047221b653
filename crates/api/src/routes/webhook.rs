//! Stripe webhook endpoint
//!
//! `POST /ls/hook/{hook_id}` — the only write path into the system. The
//! endpoint id and signature gates reject unverifiable requests; everything
//! that passes them is acknowledged with 200 regardless of handler outcomes,
//! because a non-2xx answer makes the provider redeliver and a permanently
//! failing handler would reprocess forever. Failure detail goes to the log
//! stream and the audit table instead.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use litestripe_reconcile::{DispatchReport, Outcome, WebhookEvent};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn stripe_webhook(
    State(state): State<AppState>,
    Path(hook_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    if hook_id != state.webhook_endpoint_id {
        tracing::warn!(hook_id = %hook_id, "Received webhook with unrecognized endpoint id");
        return Err(ApiError::UnknownEndpoint);
    }

    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            tracing::error!("Missing Stripe-Signature header");
            ApiError::InvalidSignature
        })?;

    state.verifier.verify(&body, signature).map_err(|e| {
        tracing::error!(error = %e, "Invalid signature for Stripe webhook");
        ApiError::InvalidSignature
    })?;

    let event = WebhookEvent::from_bytes(&body).map_err(|e| {
        tracing::error!(error = %e, "Invalid payload received for Stripe webhook");
        ApiError::InvalidPayload
    })?;

    tracing::info!(
        event_id = %event.id,
        event_type = %event.event_type,
        "Stripe webhook received"
    );

    let report = state.dispatcher.dispatch(&event).await;
    record_dispatch(&state.pool, &report).await;

    Ok(Json(json!({
        "status": "success",
        "handled": report.was_handled(),
        "handlers_succeeded": report.success_count(),
        "handlers_failed": report.failure_count(),
    })))
}

/// Best-effort audit entry per dispatched event. Insert-only (redeliveries
/// produce one row each); a failure here is logged and never surfaced to the
/// caller.
async fn record_dispatch(pool: &PgPool, report: &DispatchReport) {
    let outcomes: Vec<Value> = report
        .outcomes
        .iter()
        .map(|o| match &o.outcome {
            Outcome::Success => json!({ "handler": o.handler, "outcome": "success" }),
            Outcome::Failure(message) => json!({
                "handler": o.handler,
                "outcome": "failure",
                "error": message,
            }),
        })
        .collect();

    let result = sqlx::query(
        r#"
        INSERT INTO webhook_events
            (id, stripe_event_id, event_type, handled, failure_count, outcomes, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, NOW())
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&report.event_id)
    .bind(&report.event_type)
    .bind(report.was_handled())
    .bind(report.failure_count() as i32)
    .bind(Value::Array(outcomes))
    .execute(pool)
    .await;

    if let Err(e) = result {
        tracing::warn!(
            event_id = %report.event_id,
            error = %e,
            "Failed to record webhook audit entry"
        );
    }
}
