//! Scheduler Runtime (spec.md §4.11): a small supervisor that registers
//! named jobs (`outbox_drain`, `booking_sweep`, `email_reminders`,
//! `retention_cleanup`, `storage_janitor`), runs each on its own
//! cooperative loop with a configured interval, and upserts a
//! [`heartbeat::JobHeartbeat`] row every iteration (success or failure) so
//! `/v1/readyz` can refuse traffic once a required job has gone silent
//! past its TTL. Generalizes the teacher's provider-request scheduler
//! (account pool, fallback, priority queue) into a plain job supervisor —
//! this system's jobs have no inter-dependent scheduling policy to model,
//! just independent heartbeated loops.

pub mod backoff;
pub mod heartbeat;
pub mod runtime;

pub use backoff::{backoff_sleep, next_backoff, BackoffConfig};
pub use heartbeat::JobHeartbeat;
pub use runtime::{JobSpec, Scheduler};
