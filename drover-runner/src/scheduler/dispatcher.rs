//! Job dispatcher
//!
//! Polls the orchestrator for pending jobs and runs each batch through a
//! worker pool. Completion records flow from the workers through a result
//! channel to a forwarder pool that hands them to the completions pipeline.

use drover_client::ControlPlane;
use drover_core::domain::job::{CompletionRecord, PendingJob};
use drover_core::domain::runner::RunnerIdentity;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::reporting::ReportPipelines;
use crate::service::JobRunner;

/// Pulls jobs until shut down
pub struct Dispatcher {
    identity: Arc<RunnerIdentity>,
    plane: Arc<dyn ControlPlane>,
    runner: Arc<JobRunner>,
    reports: Arc<ReportPipelines>,
    poll_interval: Duration,
    workers: usize,
    forwarders: usize,
    shutdown: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        identity: Arc<RunnerIdentity>,
        plane: Arc<dyn ControlPlane>,
        runner: Arc<JobRunner>,
        reports: Arc<ReportPipelines>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            identity,
            plane,
            runner,
            reports,
            poll_interval: Duration::from_secs(10),
            workers: 5,
            forwarders: 5,
            shutdown,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the worker and forwarder pool sizes; zero is raised to one
    pub fn with_pools(mut self, workers: usize, forwarders: usize) -> Self {
        self.workers = workers.max(1);
        self.forwarders = forwarders.max(1);
        self
    }

    /// Starts the polling loop
    ///
    /// Returns once shutdown is requested and the in-flight batch has
    /// drained. Never polls after shutdown has been observed.
    pub async fn run(self) {
        info!(
            "Starting job dispatcher (interval: {:?}, workers: {}, forwarders: {})",
            self.poll_interval, self.workers, self.forwarders
        );

        while !self.shutdown.is_cancelled() {
            debug!("Polling for pending jobs");

            let jobs = match self.plane.poll_pending(&self.identity).await {
                Ok(jobs) => jobs,
                Err(e) if e.is_not_connected() => {
                    debug!("Control channel is down, skipping poll");
                    Vec::new()
                }
                Err(e) => {
                    warn!("Failed to poll for jobs: {}", e);
                    Vec::new()
                }
            };

            if jobs.is_empty() {
                tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    _ = time::sleep(self.poll_interval) => continue,
                }
            }

            let count = jobs.len();
            info!("Found {} job(s) to execute", count);
            self.dispatch(jobs).await;
            info!("Executed {} job(s) this cycle", count);
        }

        info!("Job dispatcher stopped");
    }

    /// Runs one batch through the pools and waits for both to drain
    async fn dispatch(&self, jobs: Vec<PendingJob>) {
        let (job_tx, job_rx) = mpsc::channel::<PendingJob>(jobs.len().max(1));
        let (result_tx, result_rx) = mpsc::channel::<CompletionRecord>(jobs.len().max(1));

        let worker_count = self.workers.min(jobs.len());
        for job in jobs {
            if job_tx.send(job).await.is_err() {
                break;
            }
        }
        drop(job_tx);

        let job_rx = Arc::new(Mutex::new(job_rx));
        let mut workers = JoinSet::new();
        for worker in 0..worker_count {
            let job_rx = Arc::clone(&job_rx);
            let result_tx = result_tx.clone();
            let runner = Arc::clone(&self.runner);

            workers.spawn(async move {
                loop {
                    // Guard is released before the job runs
                    let next = job_rx.lock().await.recv().await;
                    let Some(job) = next else { break };

                    debug!("Worker {} picked up job {}", worker, job.job_id);
                    let record = runner.run(job).await;
                    if result_tx.send(record).await.is_err() {
                        error!("Result channel closed, dropping completion");
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        let result_rx = Arc::new(Mutex::new(result_rx));
        let mut forwarders = JoinSet::new();
        for _ in 0..self.forwarders {
            let result_rx = Arc::clone(&result_rx);
            let reports = Arc::clone(&self.reports);

            forwarders.spawn(async move {
                loop {
                    let next = result_rx.lock().await.recv().await;
                    let Some(record) = next else { break };

                    let job_id = record.job_id.clone();
                    if !reports.completions.push(record) {
                        error!("Completions pipeline closed, lost record for job {}", job_id);
                    }
                }
            });
        }

        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                error!("Worker task failed: {}", e);
            }
        }
        while let Some(result) = forwarders.join_next().await {
            if let Err(e) = result {
                error!("Forwarder task failed: {}", e);
            }
        }
    }
}
