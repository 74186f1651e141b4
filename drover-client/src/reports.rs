//! Status update calls
//!
//! One method per report kind. Each takes a batch already grouped by the
//! report pipelines; none of them retry.

use crate::ControlChannel;
use crate::error::Result;
use drover_core::domain::payload::DeploymentData;
use drover_core::domain::status::{
    AgentResponse, AutomationResponse, BuildStatus, CertificateUpdate, ClusterUpsert,
    DeploymentStatus, Notification, PreviewStatus, VpcUpsert,
};
use drover_core::dto::RecordBatch;
use drover_core::dto::deployment::{GetDeploymentRequest, GetDeploymentResponse};
use drover_core::dto::methods;

impl ControlChannel {
    // =============================================================================
    // Builds, Deployments, Previews
    // =============================================================================

    pub async fn update_builds(&self, organization_id: &str, batch: Vec<BuildStatus>) -> Result<()> {
        self.acknowledged(methods::BUILDS_UPDATE, organization_id, RecordBatch::from(batch))
            .await
    }

    pub async fn update_previews(&self, organization_id: &str, batch: Vec<PreviewStatus>) -> Result<()> {
        self.acknowledged(methods::PREVIEWS_UPDATE, organization_id, RecordBatch::from(batch))
            .await
    }

    pub async fn update_deployments(
        &self,
        organization_id: &str,
        batch: Vec<DeploymentStatus>,
    ) -> Result<()> {
        self.acknowledged(
            methods::DEPLOYMENTS_UPDATE,
            organization_id,
            RecordBatch::from(batch),
        )
        .await
    }

    /// Fetch the server's record of a deployment
    ///
    /// # Returns
    /// `None` when the server does not know the deployment
    pub async fn get_deployment(
        &self,
        organization_id: &str,
        deployment_id: &str,
    ) -> Result<Option<DeploymentData>> {
        let response: GetDeploymentResponse = self
            .call_for(
                methods::DEPLOYMENTS_GET,
                organization_id,
                GetDeploymentRequest {
                    deployment_id: deployment_id.to_string(),
                },
            )
            .await?;

        Ok(response.deployment)
    }

    // =============================================================================
    // Infrastructure
    // =============================================================================

    pub async fn update_certificates(
        &self,
        organization_id: &str,
        batch: Vec<CertificateUpdate>,
    ) -> Result<()> {
        self.acknowledged(
            methods::CERTIFICATES_UPDATE,
            organization_id,
            RecordBatch::from(batch),
        )
        .await
    }

    pub async fn upsert_vpcs(&self, batch: Vec<VpcUpsert>) -> Result<()> {
        let organization_id = self.credentials.organization_id.clone();
        self.acknowledged(methods::VPCS_UPSERT, &organization_id, RecordBatch::from(batch))
            .await
    }

    pub async fn upsert_clusters(&self, batch: Vec<ClusterUpsert>) -> Result<()> {
        let organization_id = self.credentials.organization_id.clone();
        self.acknowledged(methods::CLUSTERS_UPSERT, &organization_id, RecordBatch::from(batch))
            .await
    }

    // =============================================================================
    // Messages
    // =============================================================================

    pub async fn send_notifications(
        &self,
        organization_id: &str,
        batch: Vec<Notification>,
    ) -> Result<()> {
        self.acknowledged(
            methods::NOTIFICATIONS_SEND,
            organization_id,
            RecordBatch::from(batch),
        )
        .await
    }

    pub async fn update_agent_responses(
        &self,
        organization_id: &str,
        batch: Vec<AgentResponse>,
    ) -> Result<()> {
        self.acknowledged(
            methods::AGENTS_UPDATE_RESPONSE,
            organization_id,
            RecordBatch::from(batch),
        )
        .await
    }

    pub async fn update_automation_responses(
        &self,
        organization_id: &str,
        batch: Vec<AutomationResponse>,
    ) -> Result<()> {
        self.acknowledged(
            methods::AUTOMATIONS_UPDATE_RESPONSE,
            organization_id,
            RecordBatch::from(batch),
        )
        .await
    }
}
