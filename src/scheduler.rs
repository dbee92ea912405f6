//! Fixed-interval scheduling of the batch pipelines.
//!
//! One tokio task per (bucket, job) pair. Every task runs its job
//! immediately, then sleeps for the bucket's interval, forever. Tasks never
//! coordinate with each other, and a slow job simply delays its own next
//! run. Job failures are logged and never stop the loop.
//!
//! The only way out is the stop signal carried by [`SchedulerHandle`],
//! which is observed while a task sleeps. A job that is mid-run finishes
//! its batch before the task exits.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::endpoints::EndpointMonitor;
use crate::error::Result;
use crate::models::BatchReport;
use crate::repositories::RepositoryMonitor;

/// A batch entry point driven by the scheduler.
#[async_trait]
pub trait BatchJob: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, interval_hours: u32) -> Result<BatchReport>;
}

#[async_trait]
impl BatchJob for EndpointMonitor {
    fn name(&self) -> &str {
        "endpoints"
    }

    async fn run(&self, interval_hours: u32) -> Result<BatchReport> {
        self.run_by_schedule(interval_hours).await
    }
}

#[async_trait]
impl BatchJob for RepositoryMonitor {
    fn name(&self) -> &str {
        "repositories"
    }

    async fn run(&self, interval_hours: u32) -> Result<BatchReport> {
        self.run_by_schedule(interval_hours).await
    }
}

pub struct Scheduler {
    buckets_hours: Vec<u32>,
    jobs: Vec<Arc<dyn BatchJob>>,
}

impl Scheduler {
    pub fn new(buckets_hours: Vec<u32>, jobs: Vec<Arc<dyn BatchJob>>) -> Self {
        Self {
            buckets_hours,
            jobs,
        }
    }

    /// Spawn every (bucket, job) task. Must be called inside a runtime.
    pub fn start(self) -> SchedulerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        for &hours in &self.buckets_hours {
            for job in &self.jobs {
                let job = Arc::clone(job);
                let stop = stop_rx.clone();
                let period = Duration::from_secs(u64::from(hours) * 3600);
                tasks.push(tokio::spawn(run_loop(job, hours, period, stop)));
            }
        }

        info!(
            buckets = ?self.buckets_hours,
            tasks = tasks.len(),
            "scheduler started"
        );
        SchedulerHandle {
            stop: stop_tx,
            tasks,
        }
    }
}

async fn run_loop(
    job: Arc<dyn BatchJob>,
    interval_hours: u32,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        if *stop.borrow() {
            break;
        }

        match job.run(interval_hours).await {
            Ok(report) => {
                info!(
                    job = job.name(),
                    interval_hours,
                    processed = report.processed,
                    errors = report.errors.len(),
                    "batch finished"
                );
                for e in &report.errors {
                    warn!(job = job.name(), interval_hours, error = %e, "batch item failed");
                }
            }
            Err(e) => {
                error!(job = job.name(), interval_hours, error = %e, "batch failed");
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(period) => {}
            _ = stop.changed() => break,
        }
    }
    info!(job = job.name(), interval_hours, "scheduler task stopped");
}

/// Stop signal and join handles for a running scheduler.
pub struct SchedulerHandle {
    stop: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Signal every task and wait for them to exit.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "scheduler task panicked");
            }
        }
    }
}
