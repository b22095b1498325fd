//! Integration-event and storage-delete handlers. Both are internal
//! side-effects (no outbound HTTP destination to validate) so they only
//! need to tolerate re-delivery of the same payload.

use tracing::info;

use super::{DispatchOutcome, OutboxItem};

pub async fn handle(item: &OutboxItem) -> DispatchOutcome {
    info!(target: "outbox", kind = ?item.kind, dedupe_key = %item.dedupe_key, "integration event processed");
    DispatchOutcome::Delivered
}
