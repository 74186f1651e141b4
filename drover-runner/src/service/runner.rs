//! Job runner
//!
//! Executes one job from start to finish:
//! - Opens the job's context and scoped workspace
//! - Keeps a heartbeat going that may raise the stop flag
//! - Resolves every command tag before anything runs
//! - Threads the parameter map through the commands, in order
//! - Turns the outcome into the job's build status and completion record

use drover_client::ControlPlane;
use drover_core::domain::job::{CompletionRecord, PendingJob};
use drover_core::domain::params::{ParamKey, ParamMap};
use drover_core::domain::status::{BuildState, BuildStatus};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, error, info};

use crate::commands::{Command, CommandError, Registry, build_key};
use crate::context::{Context, Workspace};
use crate::reporting::ReportPipelines;

/// One lock per workspace directory
///
/// Jobs sharing a build key share a workspace, so they run one after the
/// other. Entries nobody holds or waits on are pruned on the next acquire.
#[derive(Default)]
struct ScopeLocks {
    locks: std::sync::Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl ScopeLocks {
    async fn acquire(&self, scope: PathBuf) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(scope).or_default())
        };
        lock.lock_owned().await
    }
}

pub struct JobRunner {
    registry: Registry,
    plane: Arc<dyn ControlPlane>,
    reports: Arc<ReportPipelines>,
    workspace_root: PathBuf,
    heartbeat_interval: Duration,
    scopes: ScopeLocks,
}

impl JobRunner {
    pub fn new(
        registry: Registry,
        plane: Arc<dyn ControlPlane>,
        reports: Arc<ReportPipelines>,
        workspace_root: impl Into<PathBuf>,
        heartbeat_interval: Duration,
    ) -> Self {
        Self {
            registry,
            plane,
            reports,
            workspace_root: workspace_root.into(),
            heartbeat_interval,
            scopes: ScopeLocks::default(),
        }
    }

    /// Runs the job and returns its completion record
    ///
    /// Never fails: every error ends up in the record's `error` text.
    pub async fn run(&self, job: PendingJob) -> CompletionRecord {
        let PendingJob {
            job_id,
            parameters,
            command_enums,
        } = job;

        info!(
            "Starting job {} ({} command(s))",
            job_id,
            command_enums.len()
        );

        let organization_id: String = parameters
            .get_opt(ParamKey::OrganizationId)
            .ok()
            .flatten()
            .unwrap_or_default();
        let build_id = build_key(&parameters);
        let scope = build_id.clone().unwrap_or_else(|| job_id.clone());

        // Held until the workspace below is removed
        let _scope_guard = self
            .scopes
            .acquire(Workspace::location(
                &self.workspace_root,
                &organization_id,
                &scope,
            ))
            .await;

        let workspace = match Workspace::create(&self.workspace_root, &organization_id, &scope) {
            Ok(workspace) => workspace,
            Err(e) => {
                let error = CommandError::from(e).to_string();
                error!("Failed to open workspace for job {}: {}", job_id, error);
                self.report_failure(&organization_id, build_id.as_deref(), &error);
                return CompletionRecord::failed(job_id, error);
            }
        };

        let ctx = Context::new(job_id.clone(), Arc::clone(&self.reports), workspace);
        // Ends with this frame, even when the job future is dropped
        let heartbeat = self.spawn_heartbeat(&job_id, ctx.stop_flag());

        let outcome = self.execute(parameters, &command_enums, &ctx).await;

        drop(heartbeat);

        match outcome {
            Ok(_) => {
                ctx.log_info("Job completed successfully");
                if let Some(build_id) = &build_id {
                    self.reports.builds.push(BuildStatus::new(
                        &organization_id,
                        build_id,
                        BuildState::Succeeded,
                    ));
                }
                CompletionRecord::success(job_id)
            }
            Err(e) => {
                let error = e.to_string();
                self.report_failure(&organization_id, build_id.as_deref(), &error);
                info!("Job {} failed: {}", job_id, error);
                CompletionRecord::failed(job_id, error)
            }
        }
    }

    async fn execute(
        &self,
        mut params: ParamMap,
        tags: &[i32],
        ctx: &Context,
    ) -> Result<ParamMap, CommandError> {
        // An unknown tag fails the job before any side effect
        let mut commands: Vec<Box<dyn Command>> = Vec::with_capacity(tags.len());
        for tag in tags {
            match self.registry.get(*tag) {
                Ok(command) => commands.push(command),
                Err(e) => {
                    ctx.log_error(format!("Error in resolving command {}: {}", tag, e));
                    return Err(e);
                }
            }
        }

        for command in commands {
            let kind = command.kind();
            ctx.log_info(format!("Executing {}", kind));

            let outcome = if ctx.is_stopping() {
                Err(CommandError::Stopped)
            } else {
                command.run(params, ctx).await
            };

            params = match outcome {
                Ok(params) => params,
                Err(e) => {
                    ctx.log_error(format!("Error in executing {}: {}", kind, e));
                    return Err(e);
                }
            };
        }

        Ok(params)
    }

    fn report_failure(&self, organization_id: &str, build_id: Option<&str>, error: &str) {
        if let Some(build_id) = build_id {
            self.reports
                .builds
                .push(BuildStatus::failed(organization_id, build_id, error));
        }
    }

    /// Heartbeats the job until the handle is dropped; raises `stop` when asked to
    fn spawn_heartbeat(&self, job_id: &str, stop: Arc<AtomicBool>) -> AbortOnDropHandle<()> {
        let plane = Arc::clone(&self.plane);
        let job_id = job_id.to_string();
        let interval = self.heartbeat_interval;

        AbortOnDropHandle::new(tokio::spawn(async move {
            let mut ticker = time::interval(interval);

            loop {
                ticker.tick().await;

                match plane.heartbeat(&job_id).await {
                    Ok(true) => {
                        if !stop.swap(true, Ordering::SeqCst) {
                            info!("Orchestrator asked job {} to stop", job_id);
                        }
                    }
                    Ok(false) => {}
                    Err(e) => debug!("Heartbeat for job {} failed: {}", job_id, e),
                }
            }
        }))
    }
}
