//! Generic in-process timer registry. What triggers a run lives here; what
//! a run does lives in the job implementations, which take the current time
//! as a parameter and are therefore testable without any scheduler.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobCadence {
    HourlyAt { minute: u32 },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct JobReport {
    pub summary: String,
}

/// One recurring job. `run` must never let an error escape: every job is a
/// catch-log-continue envelope around its tenants, and the registry only
/// records the report.
#[async_trait]
pub trait ScheduledJob: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn cadence(&self) -> JobCadence;

    /// Run once immediately when the scheduler starts, to catch transitions
    /// missed while the process was down.
    fn run_on_startup(&self) -> bool {
        false
    }

    async fn run(&self, now: DateTime<Utc>) -> JobReport;
}

/// Owns one tokio task per registered job. Each task is a sequential loop,
/// so two ticks of the same job can never overlap; different jobs run
/// concurrently and independently.
pub struct JobScheduler {
    jobs: Vec<Arc<dyn ScheduledJob>>,
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl JobScheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            jobs: Vec::new(),
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn register(&mut self, job: Arc<dyn ScheduledJob>) {
        self.jobs.push(job);
    }

    pub async fn start(&self) {
        let mut handles = self.handles.lock().await;
        for job in &self.jobs {
            let job = Arc::clone(job);
            let mut shutdown_rx = self.shutdown_tx.subscribe();

            handles.push(tokio::spawn(async move {
                if job.run_on_startup() {
                    Self::run_once(&job).await;
                }

                loop {
                    let JobCadence::HourlyAt { minute } = job.cadence();
                    let wait = duration_until_next(Utc::now(), minute);

                    tokio::select! {
                        _ = tokio::time::sleep(wait) => {
                            Self::run_once(&job).await;
                        }
                        _ = shutdown_rx.changed() => {
                            debug!("Job {} loop stopping", job.name());
                            break;
                        }
                    }
                }
            }));
        }

        info!("Job scheduler started with {} jobs", self.jobs.len());
    }

    /// Signal every loop and wait for in-flight ticks to finish. There is no
    /// mid-tick cancellation; a hung external call blocks shutdown.
    pub async fn shutdown(&self) {
        info!("Job scheduler shutting down, waiting for in-flight ticks");
        let _ = self.shutdown_tx.send(true);

        let mut handles = self.handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                error!("Job task ended abnormally: {}", e);
            }
        }
    }

    async fn run_once(job: &Arc<dyn ScheduledJob>) {
        let started = Instant::now();
        debug!("Job {} tick started", job.name());

        let report = job.run(Utc::now()).await;

        info!(
            "Job {} tick finished in {}ms: {}",
            job.name(),
            started.elapsed().as_millis(),
            report.summary
        );
    }
}

/// Time until the next wall-clock instant whose minute equals `minute`,
/// always strictly in the future.
pub fn duration_until_next(now: DateTime<Utc>, minute: u32) -> std::time::Duration {
    let minute = minute.min(59);
    let at_minute = now
        .with_minute(minute)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);

    let target = if at_minute > now {
        at_minute
    } else {
        at_minute + ChronoDuration::hours(1)
    };

    (target - now).to_std().unwrap_or_default()
}
