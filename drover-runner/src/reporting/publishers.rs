//! One publisher per report kind
//!
//! Each publisher forwards a batch to the matching control-plane call. They
//! hold no state; the control plane is passed in on every call.

use super::batcher::Publish;
use async_trait::async_trait;
use drover_client::{ControlPlane, Result};
use drover_core::domain::job::CompletionRecord;
use drover_core::domain::log::JobLogLine;
use drover_core::domain::status::{
    AgentResponse, AutomationResponse, BuildStatus, CertificateUpdate, ClusterUpsert,
    DeploymentStatus, JobOutput, Notification, PreviewStatus, VpcUpsert,
};

/// Publisher for calls that take the organization id of the batch
macro_rules! org_publisher {
    ($name:ident, $record:ty, $method:ident) => {
        pub struct $name;

        #[async_trait]
        impl Publish<String, $record> for $name {
            async fn publish(
                &self,
                plane: &dyn ControlPlane,
                organization_id: &String,
                batch: Vec<$record>,
            ) -> Result<()> {
                plane.$method(organization_id, batch).await
            }
        }
    };
}

/// Publisher for calls scoped to the runner's own credentials
macro_rules! runner_publisher {
    ($name:ident, $record:ty, $method:ident) => {
        pub struct $name;

        #[async_trait]
        impl Publish<String, $record> for $name {
            async fn publish(
                &self,
                plane: &dyn ControlPlane,
                _key: &String,
                batch: Vec<$record>,
            ) -> Result<()> {
                plane.$method(batch).await
            }
        }
    };
}

runner_publisher!(CompletionPublisher, CompletionRecord, mark_jobs_complete);
runner_publisher!(JobLogPublisher, JobLogLine, send_job_logs);
runner_publisher!(VpcPublisher, VpcUpsert, upsert_vpcs);
runner_publisher!(ClusterPublisher, ClusterUpsert, upsert_clusters);

org_publisher!(BuildPublisher, BuildStatus, update_builds);
org_publisher!(PreviewPublisher, PreviewStatus, update_previews);
org_publisher!(DeploymentPublisher, DeploymentStatus, update_deployments);
org_publisher!(CertificatePublisher, CertificateUpdate, update_certificates);
org_publisher!(NotificationPublisher, Notification, send_notifications);
org_publisher!(JobOutputPublisher, JobOutput, update_job_outputs);
org_publisher!(AgentResponsePublisher, AgentResponse, update_agent_responses);
org_publisher!(
    AutomationResponsePublisher,
    AutomationResponse,
    update_automation_responses
);
