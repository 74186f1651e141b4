//! Status update records reported back to the orchestrator
//!
//! Each record kind has its own report pipeline; kinds never mix within a
//! batch. [`Partitioned`] names the key a pipeline groups records by.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::job::CompletionRecord;
use crate::domain::payload::{RouteTableMap, SubnetMap};

/// Partition key used for pipelines that batch everything together
pub const SINGLETON_PARTITION: &str = "_";

/// A record that knows which pipeline partition it belongs to
pub trait Partitioned {
    fn partition_key(&self) -> String;
}

impl Partitioned for CompletionRecord {
    fn partition_key(&self) -> String {
        SINGLETON_PARTITION.to_string()
    }
}

macro_rules! partitioned_by_org {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Partitioned for $ty {
                fn partition_key(&self) -> String {
                    self.organization_id.clone()
                }
            }
        )*
    };
}

// =============================================================================
// Builds, deployments, previews
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStatus {
    pub organization_id: String,
    pub build_id: String,
    pub status: BuildState,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl BuildStatus {
    pub fn new(organization_id: &str, build_id: &str, status: BuildState) -> Self {
        Self {
            organization_id: organization_id.to_string(),
            build_id: build_id.to_string(),
            status,
            error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn failed(organization_id: &str, build_id: &str, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(organization_id, build_id, BuildState::Failed)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentState {
    Deploying,
    Deployed,
    Failed,
    Deleting,
    Deleted,
    DeletionFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentStatus {
    pub organization_id: String,
    pub deployment_id: String,
    pub status: DeploymentState,
    pub url: Option<String>,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl DeploymentStatus {
    pub fn new(organization_id: &str, deployment_id: &str, status: DeploymentState) -> Self {
        Self {
            organization_id: organization_id.to_string(),
            deployment_id: deployment_id.to_string(),
            status,
            url: None,
            error: None,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewState {
    Deploying,
    Live,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewStatus {
    pub organization_id: String,
    pub preview_id: String,
    pub status: PreviewState,
    pub url: Option<String>,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl PreviewStatus {
    pub fn new(organization_id: &str, preview_id: &str, status: PreviewState) -> Self {
        Self {
            organization_id: organization_id.to_string(),
            preview_id: preview_id.to_string(),
            status,
            url: None,
            error: None,
            updated_at: Utc::now(),
        }
    }
}

// =============================================================================
// Infrastructure
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateState {
    PendingValidation,
    Issued,
    Failed,
}

/// Certificate progress; carries the DNS record the user must create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateUpdate {
    pub organization_id: String,
    pub certificate_arn: String,
    pub domain: String,
    pub status: CertificateState,
    pub cname_name: Option<String>,
    pub cname_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcUpsert {
    pub organization_id: String,
    pub vpc_id: String,
    pub region: String,
    pub cidr: String,
    pub subnets: SubnetMap,
    pub route_tables: RouteTableMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterUpsert {
    pub organization_id: String,
    pub cluster_arn: String,
    pub name: String,
    pub region: String,
    pub vpc_id: Option<String>,
}

// =============================================================================
// User-facing messages and outputs
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub organization_id: String,
    pub title: String,
    pub body: String,
    pub level: NotificationLevel,
}

/// Key/value outputs a job exposes to the user (URLs, ids)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutput {
    pub organization_id: String,
    pub job_id: String,
    pub outputs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub organization_id: String,
    pub agent_id: String,
    pub job_id: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationResponse {
    pub organization_id: String,
    pub automation_id: String,
    pub job_id: String,
    pub content: String,
}

partitioned_by_org!(
    BuildStatus,
    DeploymentStatus,
    PreviewStatus,
    CertificateUpdate,
    VpcUpsert,
    ClusterUpsert,
    Notification,
    JobOutput,
    AgentResponse,
    AutomationResponse,
);
