//! Log domain types

use serde::{Deserialize, Serialize};

use crate::domain::status::Partitioned;

/// One human-readable progress line produced while a job runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLogLine {
    pub job_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl JobLogLine {
    pub fn new(job_id: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            timestamp: chrono::Utc::now(),
            level,
            message: message.into(),
        }
    }
}

impl Partitioned for JobLogLine {
    fn partition_key(&self) -> String {
        self.job_id.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warning => write!(f, "warning"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}
