use async_trait::async_trait;
use drover_client::ControlPlane;
use drover_core::domain::command::CommandKind;
use drover_core::domain::params::{ParamKey, ParamMap};
use std::sync::Arc;

use super::{Command, CommandError, Toolkit};
use crate::context::Context;
use crate::effectors::{CheckoutRequest, GitError, SourceControl};

/// Clones (or fast-forwards) the job's repository into its workspace
///
/// An authentication failure triggers one token refresh and one retry.
pub struct CheckoutRepo {
    source: Arc<dyn SourceControl>,
    plane: Arc<dyn ControlPlane>,
}

impl CheckoutRepo {
    pub fn new(toolkit: &Toolkit) -> Self {
        Self {
            source: Arc::clone(&toolkit.source),
            plane: Arc::clone(&toolkit.plane),
        }
    }
}

#[async_trait]
impl Command for CheckoutRepo {
    fn kind(&self) -> CommandKind {
        CommandKind::CheckoutRepo
    }

    async fn run(&self, mut params: ParamMap, ctx: &Context) -> Result<ParamMap, CommandError> {
        let organization_id: String = params.get(ParamKey::OrganizationId)?;
        let clone_url: String = params.get(ParamKey::RepoCloneUrl)?;
        let branch: String = params.get(ParamKey::RepoBranch)?;
        let token: Option<String> = params.get_opt(ParamKey::RepoProviderToken)?;
        let installation_id: Option<i64> = params.get_opt(ParamKey::InstallationId)?;

        let mut request = CheckoutRequest {
            clone_url,
            branch,
            token,
            dest: ctx.workspace().join("repo"),
        };

        ctx.log_info(format!("Checking out {} ({})", request.clone_url, request.branch));
        ctx.log_debug(format!("Checkout directory: {}", request.dest.display()));

        let outcome = match self.source.checkout(&request).await {
            Err(GitError::AuthRequired) => {
                let Some(installation_id) = installation_id else {
                    return Err(GitError::AuthRequired.into());
                };

                ctx.log_warning("Repository authentication failed, refreshing token");
                ctx.ensure_running()?;
                let fresh = self
                    .plane
                    .refresh_git_token(installation_id, &organization_id)
                    .await?;
                params.set(ParamKey::RepoProviderToken, fresh.clone());
                request.token = Some(fresh);

                self.source.checkout(&request).await?
            }
            other => other?,
        };

        ctx.log_info(format!("Checked out commit {}", outcome.commit_hash));

        params.set(
            ParamKey::RepoPath,
            outcome.path.to_string_lossy().to_string(),
        );
        params.set(ParamKey::CommitHash, outcome.commit_hash);
        Ok(params)
    }
}
