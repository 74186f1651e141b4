//! Job domain types

use serde::{Deserialize, Serialize};

use crate::domain::params::ParamMap;

/// A job handed out by the orchestrator
///
/// Lives in memory for one worker execution; never persisted by the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingJob {
    pub job_id: String,
    #[serde(default)]
    pub parameters: ParamMap,
    /// Command-kind tags in execution order
    #[serde(default)]
    pub command_enums: Vec<i32>,
}

/// Outcome of one job, reported once through the completion pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub job_id: String,
    /// Empty on success
    pub error: String,
}

impl CompletionRecord {
    pub fn success(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            error: String::new(),
        }
    }

    pub fn failed(job_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }
}
