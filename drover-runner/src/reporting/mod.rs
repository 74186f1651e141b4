//! Report pipelines
//!
//! Every record the runner sends back to the orchestrator, apart from
//! direct request/response calls, travels through one of these batching
//! pipelines. They are created once at startup, shared by `Arc`, and drained
//! by the shutdown coordinator.

mod batcher;
mod publishers;

pub use batcher::{BatchPolicy, Batcher, Publish};

use drover_client::ControlPlane;
use drover_core::domain::job::CompletionRecord;
use drover_core::domain::log::JobLogLine;
use drover_core::domain::status::{
    AgentResponse, AutomationResponse, BuildStatus, CertificateUpdate, ClusterUpsert,
    DeploymentStatus, JobOutput, Notification, PreviewStatus, VpcUpsert,
};
use publishers::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

type Pipeline<V> = Batcher<String, V>;

/// The fixed set of pipelines, one per record kind
pub struct ReportPipelines {
    pub completions: Pipeline<CompletionRecord>,
    pub job_logs: Pipeline<JobLogLine>,
    pub builds: Pipeline<BuildStatus>,
    pub previews: Pipeline<PreviewStatus>,
    pub deployments: Pipeline<DeploymentStatus>,
    pub clusters: Pipeline<ClusterUpsert>,
    pub vpcs: Pipeline<VpcUpsert>,
    pub certificates: Pipeline<CertificateUpdate>,
    pub notifications: Pipeline<Notification>,
    pub job_outputs: Pipeline<JobOutput>,
    pub agent_responses: Pipeline<AgentResponse>,
    pub automation_responses: Pipeline<AutomationResponse>,
}

fn policy(max_records: usize, max_age_secs: u64) -> BatchPolicy {
    BatchPolicy::new(max_records, Duration::from_secs(max_age_secs))
}

impl ReportPipelines {
    /// Starts a flusher task for every pipeline
    pub fn start(plane: Arc<dyn ControlPlane>) -> Self {
        Self {
            completions: Batcher::start(
                "completions",
                policy(10, 10),
                Arc::clone(&plane),
                CompletionPublisher,
            ),
            job_logs: Batcher::start(
                "job_logs",
                policy(20, 1),
                Arc::clone(&plane),
                JobLogPublisher,
            ),
            builds: Batcher::start("builds", policy(5, 10), Arc::clone(&plane), BuildPublisher),
            previews: Batcher::start(
                "previews",
                policy(5, 5),
                Arc::clone(&plane),
                PreviewPublisher,
            ),
            deployments: Batcher::start(
                "deployments",
                policy(5, 5),
                Arc::clone(&plane),
                DeploymentPublisher,
            ),
            clusters: Batcher::start(
                "clusters",
                policy(5, 5),
                Arc::clone(&plane),
                ClusterPublisher,
            ),
            vpcs: Batcher::start("vpcs", policy(5, 5), Arc::clone(&plane), VpcPublisher),
            // Users wait on the CNAME values carried by these
            certificates: Batcher::start(
                "certificates",
                policy(5, 2),
                Arc::clone(&plane),
                CertificatePublisher,
            ),
            notifications: Batcher::start(
                "notifications",
                policy(5, 5),
                Arc::clone(&plane),
                NotificationPublisher,
            ),
            job_outputs: Batcher::start(
                "job_outputs",
                policy(5, 5),
                Arc::clone(&plane),
                JobOutputPublisher,
            ),
            agent_responses: Batcher::start(
                "agent_responses",
                policy(5, 2),
                Arc::clone(&plane),
                AgentResponsePublisher,
            ),
            automation_responses: Batcher::start(
                "automation_responses",
                policy(5, 2),
                plane,
                AutomationResponsePublisher,
            ),
        }
    }

    /// Drains every pipeline concurrently
    pub async fn shutdown(&self) {
        info!("Draining report pipelines");

        tokio::join!(
            self.completions.shutdown(),
            self.job_logs.shutdown(),
            self.builds.shutdown(),
            self.previews.shutdown(),
            self.deployments.shutdown(),
            self.clusters.shutdown(),
            self.vpcs.shutdown(),
            self.certificates.shutdown(),
            self.notifications.shutdown(),
            self.job_outputs.shutdown(),
            self.agent_responses.shutdown(),
            self.automation_responses.shutdown(),
        );

        info!("Report pipelines drained");
    }
}
