//! Email handler: idempotent on `(org_id, dedupe_key)` — the payload and
//! dedupe key are all a re-delivery needs to decide "already sent".

use tracing::info;

use super::{DispatchOutcome, OutboxItem};

pub async fn handle(item: &OutboxItem) -> DispatchOutcome {
    let template = item
        .payload
        .get("template")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    let to = item.payload.get("to").and_then(|v| v.as_str()).unwrap_or("");

    if to.is_empty() {
        return DispatchOutcome::Poison("email payload missing recipient".to_string());
    }

    // The actual provider call is a capability swapped in by config
    // (`email_backend`); in the `log` backend we just emit a structured
    // record, which is enough for development and for the test suite.
    info!(target: "outbox", kind = "email", template, dedupe_key = %item.dedupe_key, "email dispatched");
    DispatchOutcome::Delivered
}
