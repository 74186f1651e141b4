//! Structured payloads that can travel inside a parameter map

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request handed to an agent job by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentData {
    pub agent_id: String,
    pub conversation_id: Option<String>,
    pub prompt: String,
}

/// Automation that triggered a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationData {
    pub automation_id: String,
    pub name: String,
    pub run_id: Option<String>,
}

/// Server-side view of a deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentData {
    pub deployment_id: String,
    pub name: String,
    pub region: Option<String>,
    pub bucket_name: Option<String>,
    pub distribution_id: Option<String>,
    pub domain: Option<String>,
}

/// Pull-request preview environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewData {
    pub preview_id: String,
    pub branch: String,
    pub pull_request: Option<i64>,
}

/// Availability zone → subnet id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubnetMap(pub BTreeMap<String, String>);

/// Subnet id → route table id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteTableMap(pub BTreeMap<String, String>);
