//! Effectors
//!
//! Side-effecting collaborators the commands drive: source control, build
//! tools, the container engine, and the cloud provider. Commands only see
//! the traits; the binary wires concrete implementations.

pub mod build;
pub mod cloud;
pub mod container;
pub mod local_cloud;
pub mod source;

pub use build::{BuildError, BuildTool, ShellBuild};
pub use cloud::{CloudError, CloudProvider};
pub use container::{ContainerTool, DockerCli};
pub use local_cloud::LocalCloud;
pub use source::{CheckoutOutcome, CheckoutRequest, GitCli, GitError, SourceControl};

use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::context::Context;

/// Runs a child process, copying each output line into the job log
///
/// The child is killed if the returned future is dropped.
pub(crate) async fn run_streaming(
    mut command: Command,
    ctx: &Context,
) -> std::io::Result<ExitStatus> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    tokio::join!(
        forward_lines(stdout, ctx, false),
        forward_lines(stderr, ctx, true)
    );

    child.wait().await
}

async fn forward_lines<R: AsyncRead + Unpin>(stream: Option<R>, ctx: &Context, is_stderr: bool) {
    let Some(stream) = stream else {
        return;
    };

    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if is_stderr {
            ctx.log_warning(line);
        } else {
            ctx.log_info(line);
        }
    }
}
