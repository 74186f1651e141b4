//! Execution context for a running job
//!
//! Contains the per-job state commands may touch besides the parameter map:
//! - Log sink streaming lines into the job-log pipeline
//! - Advisory stop flag raised by the heartbeat
//! - Scoped workspace directory removed when the context is dropped

use drover_core::domain::log::{JobLogLine, LogLevel};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

use crate::commands::CommandError;
use crate::reporting::ReportPipelines;

/// Directory owned by one job
///
/// Created on open and removed with everything inside on drop.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
}

impl Workspace {
    /// Directory `create` uses for the same arguments
    pub fn location(root: &Path, organization: &str, scope: &str) -> PathBuf {
        root.join(sanitize(organization)).join(sanitize(scope))
    }

    /// Creates `<root>/<organization>/<scope>`
    pub fn create(root: &Path, organization: &str, scope: &str) -> std::io::Result<Self> {
        let path = Self::location(root, organization, scope);
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove workspace {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Keeps ids from escaping the workspace root
fn sanitize(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Execution context shared by the commands of one job
pub struct Context {
    job_id: String,
    reports: Arc<ReportPipelines>,
    stopping: Arc<AtomicBool>,
    workspace: Workspace,
}

impl Context {
    /// Creates a new execution context
    ///
    /// # Arguments
    /// * `job_id` - The job ID
    /// * `reports` - Pipelines receiving the job's log lines
    /// * `workspace` - Directory the job may write into
    pub fn new(job_id: impl Into<String>, reports: Arc<ReportPipelines>, workspace: Workspace) -> Self {
        Self {
            job_id: job_id.into(),
            reports,
            stopping: Arc::new(AtomicBool::new(false)),
            workspace,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    /// Handle the heartbeat task uses to raise the stop flag
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stopping)
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Fails with [`CommandError::Stopped`] once the orchestrator asked the job to stop
    pub fn ensure_running(&self) -> Result<(), CommandError> {
        if self.is_stopping() {
            return Err(CommandError::Stopped);
        }
        Ok(())
    }

    fn emit(&self, level: LogLevel, message: String) {
        self.reports
            .job_logs
            .push(JobLogLine::new(self.job_id.clone(), level, message));
    }

    /// Logs a debug message
    pub fn log_debug(&self, message: impl Into<String>) {
        let message = message.into();
        debug!(job_id = %self.job_id, "{}", message);
        self.emit(LogLevel::Debug, message);
    }

    /// Logs an info message
    pub fn log_info(&self, message: impl Into<String>) {
        let message = message.into();
        info!(job_id = %self.job_id, "{}", message);
        self.emit(LogLevel::Info, message);
    }

    /// Logs a warning message
    pub fn log_warning(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(job_id = %self.job_id, "{}", message);
        self.emit(LogLevel::Warning, message);
    }

    /// Logs an error message
    pub fn log_error(&self, message: impl Into<String>) {
        let message = message.into();
        error!(job_id = %self.job_id, "{}", message);
        self.emit(LogLevel::Error, message);
    }
}
