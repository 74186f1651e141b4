//! Build tool
//!
//! Runs the project's build command inside its checkout.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;

use super::run_streaming;
use crate::context::Context;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("`{command}` exited with status {code}")]
    Exit { command: String, code: i32 },

    #[error("`{command}` was terminated by a signal")]
    Killed { command: String },

    #[error("expected build output at {0}")]
    MissingOutput(String),

    #[error("failed to run build: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait BuildTool: Send + Sync {
    /// Runs `command` with `dir` as working directory
    async fn run(&self, dir: &Path, command: &str, ctx: &Context) -> Result<(), BuildError>;
}

/// Hands the command to `sh -c`
pub struct ShellBuild;

#[async_trait]
impl BuildTool for ShellBuild {
    async fn run(&self, dir: &Path, command: &str, ctx: &Context) -> Result<(), BuildError> {
        let mut child = Command::new("sh");
        child.arg("-c").arg(command).current_dir(dir);

        let status = run_streaming(child, ctx).await?;
        match status.code() {
            Some(0) => Ok(()),
            Some(code) => Err(BuildError::Exit {
                command: command.to_string(),
                code,
            }),
            None => Err(BuildError::Killed {
                command: command.to_string(),
            }),
        }
    }
}
