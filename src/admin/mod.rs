//! Admin Safety Gate (spec.md §4.14): IP allowlist, read-only toggle,
//! break-glass override, and write idempotency for the admin route group.

pub mod gate;
pub mod idempotency;
