//! Health and readiness checks backing `/v1/healthz` and `/v1/readyz`.
//!
//! Provides [`HealthReporter`] that aggregates multiple [`SystemHealthCheck`]
//! implementations into a single [`HealthReport`].
//!
//! # Included checks
//! - [`DatabaseHealthCheck`] — verifies Postgres can handle a `SELECT 1`
//! - [`StorageHealthCheck`] — verifies the configured storage backend signs urls
//! - [`JobHeartbeatCheck`] — verifies required scheduler jobs beat within their TTL
//!
//! # Usage
//! ```rust,no_run
//! use cleanco::health::{
//!     reporter::HealthReporter,
//!     checks::{DatabaseHealthCheck, StorageHealthCheck},
//! };
//!
//! let reporter = HealthReporter::new()
//!     .with_check(DatabaseHealthCheck::new(pool))
//!     .with_check(StorageHealthCheck::new(store));
//!
//! let report = reporter.get_health_report().await;
//! println!("overall: {}", report.status);
//! ```

pub mod checks;
pub mod reporter;

pub use checks::{
    CheckResult, CheckStatus, DatabaseHealthCheck, JobHeartbeatCheck, StorageHealthCheck,
    SystemHealthCheck,
};
pub use reporter::{HealthReport, HealthReporter};
