//! Job DTOs

use serde::{Deserialize, Serialize};

use crate::domain::job::{CompletionRecord, PendingJob};
use crate::domain::runner::{RunnerMode, TargetCloud};

/// Poll request; describes the runner so the server can pick matching jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPendingRequest {
    pub runner_id: String,
    pub service: String,
    pub cloud_account_id: String,
    pub region: String,
    pub arch: String,
    pub os: String,
    pub mode: RunnerMode,
    pub target_cloud: TargetCloud,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetPendingResponse {
    #[serde(default)]
    pub jobs: Vec<PendingJob>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkCompleteRequest {
    pub jobs: Vec<CompletionRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub job_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    #[serde(default)]
    pub stopping: bool,
}
