//! The job supervisor itself: one cooperative loop per [`JobSpec`], each
//! bounded by a per-iteration timeout and observing a shutdown signal at
//! its iteration boundary (spec.md §5 Cancellation). Graceful shutdown
//! cancels the loops, awaits the current iteration up to a drain budget,
//! then returns.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::heartbeat;

type IterationFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
type IterationFn = Arc<dyn Fn() -> IterationFuture + Send + Sync>;

/// One registered job: a name (matches `JobHeartbeat.job_name`), a poll
/// interval, a per-iteration timeout, and the async closure that runs one
/// iteration.
pub struct JobSpec {
    pub name: &'static str,
    pub interval: Duration,
    pub iteration_timeout: Duration,
    pub run: IterationFn,
}

impl JobSpec {
    pub fn new<F, Fut>(name: &'static str, interval: Duration, iteration_timeout: Duration, run: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name,
            interval,
            iteration_timeout,
            run: Arc::new(move || Box::pin(run())),
        }
    }
}

pub struct Scheduler {
    jobs: Vec<JobSpec>,
    shutdown: watch::Sender<bool>,
}

const DRAIN_BUDGET: Duration = Duration::from_secs(30);

impl Scheduler {
    pub fn new(jobs: Vec<JobSpec>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self { jobs, shutdown }
    }

    /// Spawn every registered job on its own task. Each task records a
    /// `JobHeartbeat` row after every iteration, success or failure.
    pub fn spawn_all(&self, pool: PgPool) -> Vec<tokio::task::JoinHandle<()>> {
        self.jobs
            .iter()
            .map(|job| {
                let pool = pool.clone();
                let run = Arc::clone(&job.run);
                let name = job.name;
                let interval = job.interval;
                let iteration_timeout = job.iteration_timeout;
                let mut shutdown_rx = self.shutdown.subscribe();

                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(interval);
                    loop {
                        tokio::select! {
                            _ = ticker.tick() => {}
                            _ = shutdown_rx.changed() => {
                                if *shutdown_rx.borrow() {
                                    info!(job = name, "scheduler job observed shutdown signal");
                                    break;
                                }
                            }
                        }

                        if *shutdown_rx.borrow() {
                            break;
                        }

                        let outcome = tokio::time::timeout(iteration_timeout, run()).await;
                        let success = match outcome {
                            Ok(Ok(())) => true,
                            Ok(Err(e)) => {
                                error!(job = name, err = %e, "scheduler job iteration failed");
                                false
                            }
                            Err(_) => {
                                error!(job = name, "scheduler job iteration timed out");
                                false
                            }
                        };

                        if let Err(e) = heartbeat::record(&pool, name, success).await {
                            warn!(job = name, err = %e, "failed to record job heartbeat");
                        }
                    }
                })
            })
            .collect()
    }

    /// Signal all jobs to stop at their next iteration boundary, then wait
    /// up to [`DRAIN_BUDGET`] for the in-flight iterations to finish.
    pub async fn shutdown(&self, handles: Vec<tokio::task::JoinHandle<()>>) {
        let _ = self.shutdown.send(true);
        let drain = tokio::time::timeout(DRAIN_BUDGET, futures_util::future::join_all(handles)).await;
        if drain.is_err() {
            warn!("scheduler drain budget exceeded; remaining jobs aborted at process exit");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn job_runs_and_can_be_shut_down() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter2 = Arc::clone(&counter);
        let job = JobSpec::new("test_job", Duration::from_millis(10), Duration::from_secs(1), move || {
            let counter = Arc::clone(&counter2);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        assert_eq!(job.name, "test_job");
    }
}
