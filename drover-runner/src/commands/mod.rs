//! Commands
//!
//! A command is a stateless, idempotent unit of work. It receives the job's
//! parameter map, performs its side effects through the effectors, and
//! returns the map with its outputs added. Commands report progress only
//! through the job log of the [`Context`].

mod agent;
mod certificate;
mod checkout;
mod image;
mod network;
mod registry;
mod static_site;

pub use registry::Registry;

use async_trait::async_trait;
use drover_client::{ClientError, ControlPlane};
use drover_core::domain::command::CommandKind;
use drover_core::domain::params::{ParamError, ParamKey, ParamMap};
use std::sync::Arc;
use thiserror::Error;

use crate::context::Context;
use crate::effectors::{BuildError, BuildTool, CloudError, CloudProvider, ContainerTool, GitError, SourceControl};
use crate::reporting::ReportPipelines;

/// Why a command, and therefore its job, failed
///
/// The `Display` text becomes the error of the job's completion record.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Param(#[from] ParamError),

    #[error("cloud error: {0}")]
    Cloud(#[from] CloudError),

    #[error("git error: {0}")]
    Git(#[from] GitError),

    #[error("build error: {0}")]
    Build(#[from] BuildError),

    #[error("control plane error: {0}")]
    Client(#[from] ClientError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("job stopped by the orchestrator")]
    Stopped,

    #[error("tool/command type not supported")]
    UnsupportedCommand(i32),
}

/// A single step of a job
#[async_trait]
pub trait Command: Send + Sync {
    fn kind(&self) -> CommandKind;

    async fn run(&self, params: ParamMap, ctx: &Context) -> Result<ParamMap, CommandError>;
}

/// Process-wide collaborators handed to every command factory
#[derive(Clone)]
pub struct Toolkit {
    pub plane: Arc<dyn ControlPlane>,
    pub reports: Arc<ReportPipelines>,
    pub source: Arc<dyn SourceControl>,
    pub builder: Arc<dyn BuildTool>,
    pub containers: Arc<dyn ContainerTool>,
    pub cloud: Arc<dyn CloudProvider>,
}

/// Id the job's build status is reported under
///
/// Prefers an explicit build id, then the deployment or preview the job
/// builds for.
pub fn build_key(params: &ParamMap) -> Option<String> {
    [ParamKey::BuildId, ParamKey::DeploymentId, ParamKey::PreviewId]
        .into_iter()
        .find_map(|key| params.get_opt::<String>(key).ok().flatten())
        .filter(|id| !id.is_empty())
}

/// Lowercase, dash-separated name usable for buckets and clusters
pub(crate) fn resource_name(parts: &[&str]) -> String {
    let joined = parts.join("-").to_ascii_lowercase();
    let mut name = String::with_capacity(joined.len());
    for c in joined.chars() {
        let c = if c.is_ascii_alphanumeric() { c } else { '-' };
        if !(c == '-' && name.ends_with('-')) {
            name.push(c);
        }
    }
    name.trim_matches('-').chars().take(63).collect()
}
