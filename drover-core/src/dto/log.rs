//! Log DTOs

use serde::{Deserialize, Serialize};

use crate::domain::log::JobLogLine;

/// Log lines sent from runner to orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogBatch {
    pub lines: Vec<JobLogLine>,
}
