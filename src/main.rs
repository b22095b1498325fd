use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use cleanco::config::{Config, ConfigHandle, FeatureFlags, Snapshot};
use cleanco::health::{DatabaseHealthCheck, HealthReporter, JobHeartbeatCheck, StorageHealthCheck};
use cleanco::ratelimit::{LocalLimiter, Limiter};
use cleanco::scheduler::{JobSpec, Scheduler};
use cleanco::{admin, AppContext};
use cleanco::{booking, db, outbox, retention, storage, telemetry};

#[derive(Parser)]
#[command(name = "cleancod", about = "cleanco — multi-tenant cleaning-business backend", version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to a TOML config file; CLI flags and env vars override it.
    #[arg(long, env = "CLEANCO_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP listen port.
    #[arg(long, env = "CLEANCO_PORT")]
    port: Option<u16>,

    /// `tracing` filter string (e.g. "info", "info,cleanco=debug").
    #[arg(long, env = "CLEANCO_LOG")]
    log: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server and the scheduled-jobs runtime (default).
    Serve,
    /// Load and print the redacted configuration snapshot, then exit.
    PrintConfig,
}

/// Required jobs whose heartbeat freshness gates `/v1/readyz` in strict
/// mode. `booking_sweep` is deliberately excluded — a stalled sweep
/// degrades slot release promptness but never blocks request traffic.
const REQUIRED_JOBS: &[&str] = &["outbox_drain"];

const BOOKING_HOLD_TTL_MINUTES: i64 = 30;
const REMINDER_WINDOW_HOURS: i64 = 24;
const RETENTION_BATCH_SIZE: i64 = 200;
const OUTBOX_BATCH_SIZE: i64 = 50;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.clone(), args.port, args.log.clone());

    telemetry::init_tracing(&config.log);

    match args.command.unwrap_or(Command::Serve) {
        Command::PrintConfig => {
            println!("{}", serde_json::to_string_pretty(&config.redacted_snapshot())?);
            Ok(())
        }
        Command::Serve => serve(config).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    let config = Arc::new(config);

    let pool = db::connect(&config.database_url, config.db_pool_size, config.db_statement_timeout_secs)
        .await
        .context("failed to connect to postgres")?;

    let store = storage::build(&config).context("failed to build the configured storage backend")?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.outbound_timeout_secs))
        .build()
        .context("failed to build the outbound http client")?;

    let limiter = Arc::new(Limiter::Local(LocalLimiter::new(config.rate_limit_per_min)));
    if config.rate_limit_shared_store_url.is_some() {
        warn!("rate_limit_shared_store_url is configured but no shared limiter backend is wired up yet; falling back to the local limiter");
    }

    let health = Arc::new(
        HealthReporter::new()
            .with_check(DatabaseHealthCheck::new(pool.clone()))
            .with_check(StorageHealthCheck::new(store.clone()))
            .with_check(JobHeartbeatCheck::new(
                pool.clone(),
                REQUIRED_JOBS.to_vec(),
                config.job_heartbeat_ttl_secs,
                config.job_heartbeat_required,
            )),
    );

    let metrics_handle = config.metrics_enabled.then(telemetry::metrics::install);

    let ctx = AppContext {
        config: config.clone(),
        config_handle: ConfigHandle::new((*config).clone()),
        feature_flags: Snapshot::new(FeatureFlags::default()),
        pricing_config: Snapshot::new(load_pricing_config()),
        pool: pool.clone(),
        store,
        http,
        limiter,
        health,
        started_at: Instant::now(),
        worker_id: format!("cleancod-{}", uuid::Uuid::new_v4()),
        metrics_handle,
    };

    let scheduler = Scheduler::new(build_jobs(&ctx));
    let job_handles = scheduler.spawn_all(pool.clone());

    let router = cleanco::rest::build_router(ctx);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.context("failed to bind http listener")?;
    info!(%addr, "cleanco listening");

    axum::serve(listener, router.into_make_service_with_connect_info::<std::net::SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    info!("shutting down scheduler");
    scheduler.shutdown(job_handles).await;
    Ok(())
}

/// Build the five named jobs from spec.md §4.11. Each closure captures
/// only what it needs out of `ctx` (cloned `Arc`s / `PgPool`, which are
/// cheap handles), never `ctx` itself, so the scheduler can run them
/// independently of any one request's lifetime.
fn build_jobs(ctx: &AppContext) -> Vec<JobSpec> {
    let pool = ctx.pool.clone();
    let store = ctx.store.clone();
    let config = ctx.config.clone();
    let worker_id = ctx.worker_id.clone();

    let outbox_drain = {
        let pool = pool.clone();
        let store = store.clone();
        let config = config.clone();
        let worker_id = worker_id.clone();
        let http = ctx.http.clone();
        JobSpec::new(
            "outbox_drain",
            Duration::from_secs(5),
            Duration::from_secs(30),
            move || {
                let pool = pool.clone();
                let store = store.clone();
                let config = config.clone();
                let worker_id = worker_id.clone();
                let http = http.clone();
                async move {
                    let count = outbox::drain_due(
                        &pool,
                        &worker_id,
                        OUTBOX_BATCH_SIZE,
                        &http,
                        store.as_ref(),
                        &config.export_webhook_allowlist,
                        config.export_https_only,
                        config.export_block_private_ips,
                        config.outbox_max_attempts,
                        config.outbox_base_backoff_secs,
                    )
                    .await?;
                    if count > 0 {
                        info!(count, "outbox_drain dispatched items");
                    }
                    Ok(())
                }
            },
        )
    };

    let booking_sweep = {
        let pool = pool.clone();
        JobSpec::new("booking_sweep", Duration::from_secs(60), Duration::from_secs(30), move || {
            let pool = pool.clone();
            async move {
                let expired = booking::sweep_expired(&pool, BOOKING_HOLD_TTL_MINUTES).await?;
                if expired > 0 {
                    info!(expired, "booking_sweep expired stale holds");
                }
                Ok(())
            }
        })
    };

    let email_reminders = {
        let pool = pool.clone();
        JobSpec::new("email_reminders", Duration::from_secs(300), Duration::from_secs(30), move || {
            let pool = pool.clone();
            async move {
                let request_id = uuid::Uuid::new_v4().to_string();
                let sent = booking::enqueue_due_reminders(&pool, REMINDER_WINDOW_HOURS, &request_id).await?;
                if sent > 0 {
                    info!(sent, "email_reminders enqueued reminder emails");
                }
                Ok(())
            }
        })
    };

    let retention_cleanup = {
        let pool = pool.clone();
        let config = config.clone();
        JobSpec::new("retention_cleanup", Duration::from_secs(3600), Duration::from_secs(60), move || {
            let pool = pool.clone();
            let config = config.clone();
            async move {
                let leads = retention::sweep_leads(&pool, config.retention_days).await?;
                let idempotency = admin::idempotency::prune_expired(&pool, config.admin_idempotency_ttl_hours).await?;
                if leads > 0 || idempotency > 0 {
                    info!(leads, idempotency, "retention_cleanup erased expired records");
                }
                Ok(())
            }
        })
    };

    let storage_janitor = {
        let pool = pool.clone();
        let store = store.clone();
        let config = config.clone();
        JobSpec::new("storage_janitor", Duration::from_secs(900), Duration::from_secs(60), move || {
            let pool = pool.clone();
            let store = store.clone();
            let config = config.clone();
            async move {
                let swept = retention::sweep_photos(&pool, &store, config.retention_days, RETENTION_BATCH_SIZE).await?;
                if swept > 0 {
                    info!(swept, "storage_janitor erased expired photos");
                }
                Ok(())
            }
        })
    };

    vec![outbox_drain, booking_sweep, email_reminders, retention_cleanup, storage_janitor]
}

/// `pricing.toml` next to the process config, if present. Missing or
/// unparseable files fall back to `pricing::estimate`'s built-in defaults.
fn load_pricing_config() -> serde_json::Value {
    match std::fs::read_to_string("pricing.toml") {
        Ok(contents) => toml::from_str(&contents).unwrap_or(serde_json::json!({})),
        Err(_) => serde_json::json!({}),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
