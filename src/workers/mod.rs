pub mod rate_limit_cleanup;
pub mod session_eviction;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::{MonitorConfig, WorkerConfig};
use crate::middleware::rate_limit::RateLimitState;
use crate::monitor::SessionRegistry;

/// Timeout for individual worker invocations.
const WORKER_TIMEOUT: Duration = Duration::from_secs(60);

/// Drain period before scheduler shutdown to let in-flight tasks complete.
#[cfg(test)]
const DRAIN_TIMEOUT: Duration = Duration::from_millis(10);
#[cfg(not(test))]
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerName {
    SessionEviction,
    RateLimitCleanup,
}

impl WorkerName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionEviction => "session_eviction",
            Self::RateLimitCleanup => "rate_limit_cleanup",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSchedule {
    Cron(&'static str),
    Every(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub name: WorkerName,
    pub schedule: JobSchedule,
    pub enabled: bool,
}

pub struct WorkerManager {
    registry: Arc<SessionRegistry>,
    rate_limit: Arc<RateLimitState>,
    shutdown_rx: broadcast::Receiver<()>,
    config: WorkerConfig,
    idle_ttl: Duration,
}

impl WorkerManager {
    pub fn new(
        registry: Arc<SessionRegistry>,
        rate_limit: Arc<RateLimitState>,
        shutdown_rx: broadcast::Receiver<()>,
        config: &WorkerConfig,
        monitor: &MonitorConfig,
    ) -> Self {
        Self {
            registry,
            rate_limit,
            shutdown_rx,
            config: config.clone(),
            idle_ttl: Duration::from_secs(monitor.session_idle_ttl_secs),
        }
    }

    /// Single source of truth for all planned jobs and their schedules.
    pub fn planned_jobs(&self) -> Vec<JobSpec> {
        if !self.config.is_leader {
            return Vec::new();
        }

        vec![
            JobSpec {
                name: WorkerName::SessionEviction,
                schedule: JobSchedule::Every(Duration::from_secs(
                    self.config.eviction_interval_secs.max(1),
                )),
                enabled: true,
            },
            JobSpec {
                name: WorkerName::RateLimitCleanup,
                schedule: JobSchedule::Cron("0 */5 * * * *"),
                enabled: true,
            },
        ]
    }

    /// Start the worker scheduler. Returns an error if the scheduler cannot be created or started.
    pub async fn start(mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.config.is_leader {
            tracing::info!("Worker leader disabled; skipping worker startup");
            return Ok(());
        }

        let mut scheduler = JobScheduler::new().await?;

        self.register_jobs(&scheduler).await;

        scheduler.start().await?;

        tracing::info!("Worker manager started");
        let _ = self.shutdown_rx.recv().await;

        tracing::info!(
            drain_ms = DRAIN_TIMEOUT.as_millis() as u64,
            "Worker manager shutting down"
        );
        tokio::time::sleep(DRAIN_TIMEOUT).await;
        let _ = scheduler.shutdown().await;
        Ok(())
    }

    async fn register_jobs(&self, scheduler: &JobScheduler) {
        for spec in &self.planned_jobs() {
            if !spec.enabled {
                tracing::info!(name = spec.name.as_str(), "Skipping disabled worker");
                continue;
            }

            let name_str = spec.name.as_str();
            match spec.name {
                WorkerName::SessionEviction => {
                    let registry = self.registry.clone();
                    let ttl = self.idle_ttl;
                    add_job(scheduler, spec.schedule, name_str, move || {
                        let registry = registry.clone();
                        async move {
                            session_eviction::run(&registry, ttl).await;
                        }
                    })
                    .await;
                }
                WorkerName::RateLimitCleanup => {
                    let rate_limit = self.rate_limit.clone();
                    add_job(scheduler, spec.schedule, name_str, move || {
                        let rate_limit = rate_limit.clone();
                        async move {
                            rate_limit_cleanup::run(&rate_limit).await;
                        }
                    })
                    .await;
                }
            }
            tracing::info!(name = name_str, schedule = ?spec.schedule, "Registered worker");
        }
    }
}

type JobFuture = std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>;

/// Add a job to the scheduler with an overlap guard and timeout wrapper.
async fn add_job<Fut, F>(scheduler: &JobScheduler, schedule: JobSchedule, name: &'static str, mut run: F)
where
    F: FnMut() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let running = Arc::new(AtomicBool::new(false));

    let body = move |_uuid: uuid::Uuid, _lock: JobScheduler| {
        let guard = running.clone();

        if guard
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!(
                worker = name,
                "Skipping worker invocation: previous run still in progress"
            );
            return Box::pin(async {}) as JobFuture;
        }

        let fut = run();
        Box::pin(async move {
            if tokio::time::timeout(WORKER_TIMEOUT, fut).await.is_err() {
                tracing::error!(
                    worker = name,
                    timeout_secs = WORKER_TIMEOUT.as_secs(),
                    "Worker timed out"
                );
            }
            guard.store(false, Ordering::SeqCst);
        })
    };

    let job = match schedule {
        JobSchedule::Cron(cron) => Job::new_async(cron, body),
        JobSchedule::Every(interval) => Job::new_repeated_async(interval, body),
    };

    match job {
        Ok(job) => {
            if let Err(err) = scheduler.add(job).await {
                tracing::error!(error = %err, worker = name, "Failed to add worker job");
            }
        }
        Err(err) => tracing::error!(error = %err, worker = name, "Failed to create worker job"),
    }
}
