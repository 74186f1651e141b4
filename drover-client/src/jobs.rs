//! Job-related calls

use crate::ControlChannel;
use crate::error::Result;
use drover_core::domain::job::{CompletionRecord, PendingJob};
use drover_core::domain::log::JobLogLine;
use drover_core::domain::runner::RunnerIdentity;
use drover_core::domain::status::JobOutput;
use drover_core::dto::RecordBatch;
use drover_core::dto::job::{
    GetPendingRequest, GetPendingResponse, HeartbeatRequest, HeartbeatResponse,
    MarkCompleteRequest,
};
use drover_core::dto::log::LogBatch;
use drover_core::dto::methods;

impl ControlChannel {
    // =============================================================================
    // Job Lifecycle
    // =============================================================================

    /// Pull the jobs currently queued for this runner
    ///
    /// # Arguments
    /// * `identity` - The runner identity used by the server for matching
    ///
    /// # Returns
    /// The pending jobs, possibly empty
    pub async fn poll_pending(&self, identity: &RunnerIdentity) -> Result<Vec<PendingJob>> {
        let request = GetPendingRequest {
            runner_id: identity.instance_id.clone(),
            service: identity.service.clone(),
            cloud_account_id: identity.cloud_account_id.clone(),
            region: identity.region.clone(),
            arch: identity.arch.clone(),
            os: identity.os.clone(),
            mode: identity.mode,
            target_cloud: identity.target_cloud,
        };

        let response: GetPendingResponse = self.call(methods::JOBS_GET_PENDING, request).await?;
        Ok(response.jobs)
    }

    /// Report finished jobs
    pub async fn mark_jobs_complete(&self, records: Vec<CompletionRecord>) -> Result<()> {
        let organization_id = self.credentials.organization_id.clone();
        self.acknowledged(
            methods::JOBS_MARK_COMPLETE,
            &organization_id,
            MarkCompleteRequest { jobs: records },
        )
        .await
    }

    /// Tell the server a job is still alive
    ///
    /// # Returns
    /// `true` when the server asks the job to stop
    pub async fn heartbeat(&self, job_id: &str) -> Result<bool> {
        let response: HeartbeatResponse = self
            .call(
                methods::JOBS_UPSERT_HEARTBEAT,
                HeartbeatRequest {
                    job_id: job_id.to_string(),
                },
            )
            .await?;

        Ok(response.stopping)
    }

    /// Publish user-visible job outputs
    pub async fn update_job_outputs(&self, organization_id: &str, outputs: Vec<JobOutput>) -> Result<()> {
        self.acknowledged(
            methods::JOBS_UPDATE_OUTPUT,
            organization_id,
            RecordBatch::from(outputs),
        )
        .await
    }

    // =============================================================================
    // Job Logs
    // =============================================================================

    /// Send log lines for one or more jobs
    pub async fn send_job_logs(&self, lines: Vec<JobLogLine>) -> Result<()> {
        if lines.is_empty() {
            return Ok(());
        }

        let organization_id = self.credentials.organization_id.clone();
        self.acknowledged(methods::LOGS_ADD_FOR_JOB, &organization_id, LogBatch { lines })
            .await
    }
}
