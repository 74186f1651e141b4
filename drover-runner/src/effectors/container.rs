//! Container image builds
//!
//! Talks to the docker CLI. Building is skipped when the tag already exists
//! locally, which keeps image commands idempotent.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use super::build::BuildError;
use super::run_streaming;
use crate::context::Context;

#[async_trait]
pub trait ContainerTool: Send + Sync {
    async fn image_exists(&self, image: &str) -> Result<bool, BuildError>;

    async fn build(
        &self,
        context_dir: &Path,
        dockerfile: &Path,
        image: &str,
        ctx: &Context,
    ) -> Result<(), BuildError>;
}

/// Drives the `docker` binary
pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    pub fn new() -> Self {
        Self {
            binary: "docker".to_string(),
        }
    }

    /// Checks the engine answers before any job needs it
    pub async fn check_available(&self) -> Result<String, BuildError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(BuildError::Exit {
                command: format!("{} --version", self.binary),
                code: output.status.code().unwrap_or(-1),
            });
        }

        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!("Container engine is available: {}", version);
        Ok(version)
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerTool for DockerCli {
    async fn image_exists(&self, image: &str) -> Result<bool, BuildError> {
        let status = Command::new(&self.binary)
            .args(["image", "inspect", image])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await?;

        debug!("Image {} present: {}", image, status.success());
        Ok(status.success())
    }

    async fn build(
        &self,
        context_dir: &Path,
        dockerfile: &Path,
        image: &str,
        ctx: &Context,
    ) -> Result<(), BuildError> {
        let mut command = Command::new(&self.binary);
        command
            .arg("build")
            .arg("-t")
            .arg(image)
            .arg("-f")
            .arg(dockerfile)
            .arg(context_dir);

        let status = run_streaming(command, ctx).await?;
        if status.success() {
            Ok(())
        } else {
            Err(BuildError::Exit {
                command: format!("{} build -t {}", self.binary, image),
                code: status.code().unwrap_or(-1),
            })
        }
    }
}
