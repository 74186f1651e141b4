//! Trait surface of the control channel
//!
//! Runner components depend on [`ControlPlane`] rather than on
//! [`ControlChannel`] directly so report publishers and commands can be
//! exercised against in-memory doubles.

use async_trait::async_trait;
use drover_core::domain::job::{CompletionRecord, PendingJob};
use drover_core::domain::log::JobLogLine;
use drover_core::domain::payload::DeploymentData;
use drover_core::domain::runner::RunnerIdentity;
use drover_core::domain::status::{
    AgentResponse, AutomationResponse, BuildStatus, CertificateUpdate, ClusterUpsert,
    DeploymentStatus, JobOutput, Notification, PreviewStatus, VpcUpsert,
};

use crate::ControlChannel;
use crate::error::Result;

/// Request/response operations offered by the orchestrator
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Lock-free, possibly stale view of the connection
    fn is_connected(&self) -> bool;

    async fn poll_pending(&self, identity: &RunnerIdentity) -> Result<Vec<PendingJob>>;

    async fn mark_jobs_complete(&self, records: Vec<CompletionRecord>) -> Result<()>;

    /// Returns `true` when the server asks the job to stop
    async fn heartbeat(&self, job_id: &str) -> Result<bool>;

    async fn send_job_logs(&self, lines: Vec<JobLogLine>) -> Result<()>;

    async fn update_builds(&self, organization_id: &str, batch: Vec<BuildStatus>) -> Result<()>;

    async fn update_previews(&self, organization_id: &str, batch: Vec<PreviewStatus>) -> Result<()>;

    async fn update_deployments(
        &self,
        organization_id: &str,
        batch: Vec<DeploymentStatus>,
    ) -> Result<()>;

    async fn get_deployment(
        &self,
        organization_id: &str,
        deployment_id: &str,
    ) -> Result<Option<DeploymentData>>;

    async fn update_certificates(
        &self,
        organization_id: &str,
        batch: Vec<CertificateUpdate>,
    ) -> Result<()>;

    async fn upsert_vpcs(&self, batch: Vec<VpcUpsert>) -> Result<()>;

    async fn upsert_clusters(&self, batch: Vec<ClusterUpsert>) -> Result<()>;

    async fn send_notifications(&self, organization_id: &str, batch: Vec<Notification>) -> Result<()>;

    async fn update_job_outputs(&self, organization_id: &str, batch: Vec<JobOutput>) -> Result<()>;

    async fn update_agent_responses(
        &self,
        organization_id: &str,
        batch: Vec<AgentResponse>,
    ) -> Result<()>;

    async fn update_automation_responses(
        &self,
        organization_id: &str,
        batch: Vec<AutomationResponse>,
    ) -> Result<()>;

    async fn refresh_git_token(&self, installation_id: i64, organization_id: &str) -> Result<String>;
}

#[async_trait]
impl ControlPlane for ControlChannel {
    fn is_connected(&self) -> bool {
        ControlChannel::is_connected(self)
    }

    async fn poll_pending(&self, identity: &RunnerIdentity) -> Result<Vec<PendingJob>> {
        ControlChannel::poll_pending(self, identity).await
    }

    async fn mark_jobs_complete(&self, records: Vec<CompletionRecord>) -> Result<()> {
        ControlChannel::mark_jobs_complete(self, records).await
    }

    async fn heartbeat(&self, job_id: &str) -> Result<bool> {
        ControlChannel::heartbeat(self, job_id).await
    }

    async fn send_job_logs(&self, lines: Vec<JobLogLine>) -> Result<()> {
        ControlChannel::send_job_logs(self, lines).await
    }

    async fn update_builds(&self, organization_id: &str, batch: Vec<BuildStatus>) -> Result<()> {
        ControlChannel::update_builds(self, organization_id, batch).await
    }

    async fn update_previews(&self, organization_id: &str, batch: Vec<PreviewStatus>) -> Result<()> {
        ControlChannel::update_previews(self, organization_id, batch).await
    }

    async fn update_deployments(
        &self,
        organization_id: &str,
        batch: Vec<DeploymentStatus>,
    ) -> Result<()> {
        ControlChannel::update_deployments(self, organization_id, batch).await
    }

    async fn get_deployment(
        &self,
        organization_id: &str,
        deployment_id: &str,
    ) -> Result<Option<DeploymentData>> {
        ControlChannel::get_deployment(self, organization_id, deployment_id).await
    }

    async fn update_certificates(
        &self,
        organization_id: &str,
        batch: Vec<CertificateUpdate>,
    ) -> Result<()> {
        ControlChannel::update_certificates(self, organization_id, batch).await
    }

    async fn upsert_vpcs(&self, batch: Vec<VpcUpsert>) -> Result<()> {
        ControlChannel::upsert_vpcs(self, batch).await
    }

    async fn upsert_clusters(&self, batch: Vec<ClusterUpsert>) -> Result<()> {
        ControlChannel::upsert_clusters(self, batch).await
    }

    async fn send_notifications(&self, organization_id: &str, batch: Vec<Notification>) -> Result<()> {
        ControlChannel::send_notifications(self, organization_id, batch).await
    }

    async fn update_job_outputs(&self, organization_id: &str, batch: Vec<JobOutput>) -> Result<()> {
        ControlChannel::update_job_outputs(self, organization_id, batch).await
    }

    async fn update_agent_responses(
        &self,
        organization_id: &str,
        batch: Vec<AgentResponse>,
    ) -> Result<()> {
        ControlChannel::update_agent_responses(self, organization_id, batch).await
    }

    async fn update_automation_responses(
        &self,
        organization_id: &str,
        batch: Vec<AutomationResponse>,
    ) -> Result<()> {
        ControlChannel::update_automation_responses(self, organization_id, batch).await
    }

    async fn refresh_git_token(&self, installation_id: i64, organization_id: &str) -> Result<String> {
        ControlChannel::refresh_git_token(self, installation_id, organization_id).await
    }
}
