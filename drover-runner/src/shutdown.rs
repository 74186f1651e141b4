//! Graceful shutdown
//!
//! SIGINT and SIGTERM cancel a shared token. The dispatcher stops polling
//! when it sees the token, lets in-flight jobs finish, and returns; the
//! coordinator then drains every report pipeline and closes the channel.

use drover_client::ControlChannel;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::reporting::ReportPipelines;

#[derive(Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token the dispatcher watches
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancels the token on the first SIGINT or SIGTERM
    pub fn install_signal_handlers(&self) -> std::io::Result<JoinHandle<()>> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let token = self.token.clone();

        Ok(tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                _ = sigint.recv() => info!("Received SIGINT, shutting down"),
                _ = token.cancelled() => return,
            }
            token.cancel();
        }))
    }

    /// Waits for the dispatcher to return, then flushes every pipeline
    pub async fn drain(&self, dispatcher: JoinHandle<()>, reports: &ReportPipelines) {
        if let Err(e) = dispatcher.await {
            error!("Dispatcher task failed: {}", e);
        }
        reports.shutdown().await;
    }

    /// Full shutdown sequence; returns once the channel is closed
    pub async fn run(
        &self,
        dispatcher: JoinHandle<()>,
        reports: &ReportPipelines,
        channel: &ControlChannel,
    ) {
        self.drain(dispatcher, reports).await;
        channel.disconnect().await;
        info!("Shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Registry;
    use crate::scheduler::Dispatcher;
    use crate::service::JobRunner;
    use crate::testing::toolkit;
    use drover_core::domain::command::CommandKind;
    use drover_core::domain::job::{CompletionRecord, PendingJob};
    use drover_core::domain::params::{ParamKey, ParamMap};
    use drover_core::domain::runner::{RunnerIdentity, RunnerMode, TargetCloud};
    use std::sync::Arc;
    use std::time::Duration;

    fn build_job(job_id: &str) -> PendingJob {
        PendingJob {
            job_id: job_id.to_string(),
            parameters: ParamMap::new()
                .with(ParamKey::OrganizationId, "org1".to_string())
                .with(ParamKey::BuildId, job_id.to_string())
                .with(ParamKey::RepoCloneUrl, "https://git.example/a/b.git".to_string())
                .with(ParamKey::RepoBranch, "main".to_string())
                .with(ParamKey::BuildCommand, "make".to_string()),
            command_enums: vec![
                CommandKind::CheckoutRepo.tag(),
                CommandKind::BuildStaticSite.tag(),
            ],
        }
    }

    #[tokio::test]
    async fn test_shutdown_mid_batch_finishes_in_flight_jobs() {
        let (toolkit, fakes) = toolkit();
        let root = tempfile::tempdir().unwrap();
        fakes.builder.set_delay(Duration::from_millis(300));
        fakes.plane.push_jobs(vec![build_job("b1"), build_job("b2")]);

        let coordinator = ShutdownCoordinator::new();
        let runner = JobRunner::new(
            Registry::new(toolkit),
            fakes.plane.clone(),
            Arc::clone(&fakes.reports),
            root.path(),
            Duration::from_secs(30),
        );
        let dispatcher = Dispatcher::new(
            Arc::new(RunnerIdentity::for_host(
                "web",
                "eu-west-1",
                "",
                RunnerMode::Local,
                TargetCloud::Local,
            )),
            fakes.plane.clone(),
            Arc::new(runner),
            Arc::clone(&fakes.reports),
            coordinator.token(),
        )
        .with_poll_interval(Duration::from_millis(20))
        .with_pools(2, 2);
        let handle = tokio::spawn(dispatcher.run());

        // Both builds are running once both commands are recorded
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while fakes.builder.commands().len() < 2 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(fakes.builder.commands().len(), 2);

        coordinator.token().cancel();
        coordinator.drain(handle, &fakes.reports).await;

        assert_eq!(fakes.plane.poll_count(), 1);
        let mut completions = fakes.plane.completions();
        completions.sort_by(|a, b| a.job_id.cmp(&b.job_id));
        assert_eq!(
            completions,
            vec![
                CompletionRecord::success("b1"),
                CompletionRecord::success("b2"),
            ]
        );
        assert!(
            fakes
                .plane
                .log_messages("b1")
                .contains(&"Job completed successfully".to_string())
        );

        // Drained pipelines accept nothing more
        assert!(!fakes.reports.completions.push(CompletionRecord::success("late")));
    }

    #[tokio::test]
    async fn test_signal_task_exits_when_token_is_cancelled() {
        let coordinator = ShutdownCoordinator::new();
        let handle = coordinator.install_signal_handlers().unwrap();

        coordinator.token().cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
