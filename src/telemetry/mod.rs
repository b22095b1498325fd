//! Structured audit logging and PII/secret redaction.
//!
//! Every request-handling branch emits an [`audit::AuditEvent`] carrying
//! `request_id`, `org_id`, and `principal`; [`redact`] scrubs both audit
//! payloads and ordinary log lines of emails, phone numbers, addresses,
//! `Authorization` headers, and signed-URL query tokens before anything
//! reaches stdout or a log sink.

pub mod audit;
pub mod metrics;
pub mod redact;

pub use audit::{emit, AuditEvent};
pub use redact::{is_high_entropy, redact_json, redact_str};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global `tracing` subscriber: JSON-formatted structured logs
/// filtered by `log_filter` (e.g. `"info"`, `"info,cleanco=debug"`).
pub fn init_tracing(log_filter: &str) {
    let filter = EnvFilter::try_new(log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().json().with_target(true).with_current_span(true);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
