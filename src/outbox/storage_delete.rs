//! Storage-janitor handler: the photo service removes the DB row first and
//! enqueues the object delete here, so a crash between the two leaves an
//! orphaned object (safe) rather than a dangling DB reference (unsafe).

use super::{DispatchOutcome, OutboxItem};
use crate::storage::ObjectStore;

pub async fn handle(item: &OutboxItem, store: &dyn ObjectStore) -> DispatchOutcome {
    let key = match item.payload.get("key").and_then(|v| v.as_str()) {
        Some(k) => k,
        None => return DispatchOutcome::Poison("storage-delete payload missing key".to_string()),
    };

    match store.delete(key).await {
        Ok(()) => DispatchOutcome::Delivered,
        Err(e) => DispatchOutcome::Retry(format!("storage delete failed: {e}")),
    }
}
