pub mod admin;
pub mod booking;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod health;
pub mod http;
pub mod identity;
pub mod invoice;
pub mod leads;
pub mod outbox;
pub mod photos;
pub mod policy;
pub mod pricing;
pub mod ratelimit;
pub mod rest;
pub mod retention;
pub mod scheduler;
pub mod storage;
pub mod telemetry;
pub mod tenant;

use std::sync::Arc;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;

use config::{Config, ConfigHandle, FeatureFlags, Snapshot};
use health::HealthReporter;
use ratelimit::Limiter;
use storage::ObjectStore;

/// Shared application state handed to every axum handler and scheduler job.
///
/// `config` is the boot-time snapshot consulted by every synchronous call
/// site (auth secret, log mode); `config_handle` is the atomically-swappable
/// copy behind `GET/POST /v1/admin/config`, so a reload never races a
/// request reading `config` mid-flight.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub config_handle: ConfigHandle,
    pub feature_flags: Snapshot<FeatureFlags>,
    /// Coefficients consulted by `pricing::estimate`, reloadable via
    /// `POST /v1/admin/pricing/reload` without a process restart.
    pub pricing_config: Snapshot<serde_json::Value>,
    pub pool: PgPool,
    pub store: Arc<dyn ObjectStore>,
    pub http: reqwest::Client,
    pub limiter: Arc<Limiter>,
    pub health: Arc<HealthReporter>,
    pub started_at: Instant,
    /// Stable identity for this process, used as the outbox lease owner.
    pub worker_id: String,
    /// `Some` only when `config.metrics_enabled` — backs `GET /v1/metrics`.
    pub metrics_handle: Option<PrometheusHandle>,
}
