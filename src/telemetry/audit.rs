//! Structured audit events.
//!
//! Every branch of request handling — session issue/refresh/revoke, booking
//! transitions, webhook processing, admin writes, break-glass use — appends
//! one [`AuditEvent`] through [`AuditSink`]. Events are redacted before they
//! are serialized to the `tracing` JSON layer, so a leaked log line can never
//! carry a customer email, phone number, or signed-URL token.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::redact::redact_json;

/// One audit record. `detail` is an arbitrary JSON blob specific to
/// `event_name`; it is redacted in place before emission.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub request_id: String,
    pub org_id: Option<Uuid>,
    pub principal: String,
    pub event_name: String,
    pub detail: Value,
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        request_id: impl Into<String>,
        org_id: Option<Uuid>,
        principal: impl Into<String>,
        event_name: impl Into<String>,
        detail: Value,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            org_id,
            principal: principal.into(),
            event_name: event_name.into(),
            detail,
            at: Utc::now(),
        }
    }
}

/// Thin sink that redacts and emits an [`AuditEvent`] as a structured
/// `tracing` record. A future revision can fan this out to a durable audit
/// table; request handlers only depend on this trait-free function so that
/// swap stays local.
pub fn emit(mut event: AuditEvent) {
    redact_json(&mut event.detail);
    info!(
        target: "audit",
        request_id = %event.request_id,
        org_id = ?event.org_id,
        principal = %event.principal,
        event = %event.event_name,
        detail = %event.detail,
        "audit"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_does_not_panic_on_pii_detail() {
        let event = AuditEvent::new(
            "req-1",
            Some(Uuid::nil()),
            "admin:owner",
            "lead.created",
            serde_json::json!({"email": "a@b.com"}),
        );
        emit(event);
    }
}
