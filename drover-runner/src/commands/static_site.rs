//! Static site build, deploy, and teardown

use async_trait::async_trait;
use drover_client::ControlPlane;
use drover_core::domain::command::CommandKind;
use drover_core::domain::params::{ParamKey, ParamMap};
use drover_core::domain::status::{
    BuildState, BuildStatus, DeploymentState, DeploymentStatus, JobOutput, PreviewState,
    PreviewStatus,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::{Command, CommandError, Toolkit, build_key, resource_name};
use crate::context::Context;
use crate::effectors::{BuildError, BuildTool, CloudProvider};
use crate::reporting::ReportPipelines;

// =============================================================================
// Build
// =============================================================================

pub struct BuildStaticSite {
    builder: Arc<dyn BuildTool>,
    reports: Arc<ReportPipelines>,
}

impl BuildStaticSite {
    pub fn new(toolkit: &Toolkit) -> Self {
        Self {
            builder: Arc::clone(&toolkit.builder),
            reports: Arc::clone(&toolkit.reports),
        }
    }
}

#[async_trait]
impl Command for BuildStaticSite {
    fn kind(&self) -> CommandKind {
        CommandKind::BuildStaticSite
    }

    async fn run(&self, params: ParamMap, ctx: &Context) -> Result<ParamMap, CommandError> {
        let organization_id: String = params.get(ParamKey::OrganizationId)?;
        let repo_path: String = params.get(ParamKey::RepoPath)?;
        let build_command: String = params.get(ParamKey::BuildCommand)?;
        let publish_directory: Option<String> = params.get_opt(ParamKey::PublishDirectory)?;

        if let Some(build_id) = build_key(&params) {
            self.reports.builds.push(BuildStatus::new(
                &organization_id,
                &build_id,
                BuildState::Running,
            ));
        }

        ctx.log_info(format!("Running build: {}", build_command));
        self.builder
            .run(PathBuf::from(&repo_path).as_path(), &build_command, ctx)
            .await?;

        if let Some(publish_directory) = publish_directory {
            let output = PathBuf::from(&repo_path).join(&publish_directory);
            if !output.is_dir() {
                return Err(BuildError::MissingOutput(publish_directory).into());
            }
        }

        ctx.log_info("Build finished");
        Ok(params)
    }
}

// =============================================================================
// Deploy
// =============================================================================

/// What a static site is deployed for
enum SiteTarget {
    Deployment(String),
    Preview(String),
}

impl SiteTarget {
    fn from_params(params: &ParamMap) -> Result<Self, CommandError> {
        if let Some(id) = params.get_opt::<String>(ParamKey::DeploymentId)? {
            return Ok(SiteTarget::Deployment(id));
        }
        let id: String = params.get(ParamKey::PreviewId)?;
        Ok(SiteTarget::Preview(id))
    }

    fn id(&self) -> &str {
        match self {
            SiteTarget::Deployment(id) | SiteTarget::Preview(id) => id,
        }
    }
}

/// Publishes the build output behind a bucket and a distribution
pub struct DeployStaticSite {
    cloud: Arc<dyn CloudProvider>,
    reports: Arc<ReportPipelines>,
}

impl DeployStaticSite {
    pub fn new(toolkit: &Toolkit) -> Self {
        Self {
            cloud: Arc::clone(&toolkit.cloud),
            reports: Arc::clone(&toolkit.reports),
        }
    }

    fn report(
        &self,
        organization_id: &str,
        target: &SiteTarget,
        deployed: bool,
        url: Option<String>,
        error: Option<String>,
    ) {
        match target {
            SiteTarget::Deployment(id) => {
                let state = match (deployed, &error) {
                    (_, Some(_)) => DeploymentState::Failed,
                    (true, None) => DeploymentState::Deployed,
                    (false, None) => DeploymentState::Deploying,
                };
                let mut status = DeploymentStatus::new(organization_id, id, state);
                status.url = url;
                status.error = error;
                self.reports.deployments.push(status);
            }
            SiteTarget::Preview(id) => {
                let state = match (deployed, &error) {
                    (_, Some(_)) => PreviewState::Failed,
                    (true, None) => PreviewState::Live,
                    (false, None) => PreviewState::Deploying,
                };
                let mut status = PreviewStatus::new(organization_id, id, state);
                status.url = url;
                status.error = error;
                self.reports.previews.push(status);
            }
        }
    }

    async fn deploy(
        &self,
        mut params: ParamMap,
        organization_id: &str,
        target: &SiteTarget,
        ctx: &Context,
    ) -> Result<ParamMap, CommandError> {
        let region: String = params.get(ParamKey::Region)?;
        let repo_path: String = params.get(ParamKey::RepoPath)?;
        let publish_directory: String = params
            .get_opt(ParamKey::PublishDirectory)?
            .unwrap_or_else(|| ".".to_string());
        let domain: Option<String> = params.get_opt(ParamKey::DomainName)?;
        let bucket_name = match params.get_opt::<String>(ParamKey::BucketName)? {
            Some(name) => name,
            None => resource_name(&["drover", organization_id, target.id()]),
        };

        let bucket = match self.cloud.find_bucket(&region, &bucket_name).await? {
            Some(bucket) => {
                ctx.log_info(format!("Using existing bucket {}", bucket.name));
                bucket
            }
            None => {
                ctx.log_info(format!("Creating bucket {}", bucket_name));
                self.cloud.create_bucket(&region, &bucket_name).await?
            }
        };
        params.set(ParamKey::BucketName, bucket.name.clone());
        params.set(ParamKey::BucketLocation, bucket.location.clone());

        ctx.ensure_running()?;
        let source = PathBuf::from(&repo_path).join(&publish_directory);
        let uploaded = self.cloud.upload_directory(&bucket.name, &source).await?;
        ctx.log_info(format!("Uploaded {} file(s)", uploaded));

        ctx.ensure_running()?;
        let distribution = match self.cloud.find_distribution(&bucket.name).await? {
            Some(distribution) => distribution,
            None => {
                ctx.log_info("Creating distribution");
                self.cloud
                    .create_distribution(&bucket.name, domain.as_deref())
                    .await?
            }
        };

        let site_url = format!(
            "https://{}",
            domain.as_deref().unwrap_or(&distribution.domain)
        );
        params.set(ParamKey::DistributionId, distribution.id);
        params.set(ParamKey::DistributionDomain, distribution.domain);
        params.set(ParamKey::SiteUrl, site_url.clone());

        self.reports.job_outputs.push(JobOutput {
            organization_id: organization_id.to_string(),
            job_id: ctx.job_id().to_string(),
            outputs: BTreeMap::from([("site_url".to_string(), site_url.clone())]),
        });
        self.report(organization_id, target, true, Some(site_url.clone()), None);

        ctx.log_info(format!("Site is live at {}", site_url));
        Ok(params)
    }
}

#[async_trait]
impl Command for DeployStaticSite {
    fn kind(&self) -> CommandKind {
        CommandKind::DeployAwsStaticSite
    }

    async fn run(&self, params: ParamMap, ctx: &Context) -> Result<ParamMap, CommandError> {
        let organization_id: String = params.get(ParamKey::OrganizationId)?;
        let target = SiteTarget::from_params(&params)?;

        self.report(&organization_id, &target, false, None, None);

        match self.deploy(params, &organization_id, &target, ctx).await {
            Ok(params) => Ok(params),
            Err(e) => {
                self.report(&organization_id, &target, false, None, Some(e.to_string()));
                Err(e)
            }
        }
    }
}

// =============================================================================
// Delete
// =============================================================================

/// Removes the distribution and bucket of a deployment
///
/// Resource names missing from the parameters are looked up on the server.
pub struct DeleteStaticSite {
    cloud: Arc<dyn CloudProvider>,
    plane: Arc<dyn ControlPlane>,
    reports: Arc<ReportPipelines>,
}

impl DeleteStaticSite {
    pub fn new(toolkit: &Toolkit) -> Self {
        Self {
            cloud: Arc::clone(&toolkit.cloud),
            plane: Arc::clone(&toolkit.plane),
            reports: Arc::clone(&toolkit.reports),
        }
    }

    async fn delete(
        &self,
        params: &ParamMap,
        organization_id: &str,
        deployment_id: &str,
        ctx: &Context,
    ) -> Result<(), CommandError> {
        let mut bucket_name: Option<String> = params.get_opt(ParamKey::BucketName)?;
        let mut distribution_id: Option<String> = params.get_opt(ParamKey::DistributionId)?;

        if bucket_name.is_none() {
            if let Some(deployment) = self
                .plane
                .get_deployment(organization_id, deployment_id)
                .await?
            {
                bucket_name = deployment.bucket_name;
                distribution_id = distribution_id.or(deployment.distribution_id);
            }
        }

        let Some(bucket_name) = bucket_name else {
            ctx.log_warning("Deployment has no bucket, nothing to delete");
            return Ok(());
        };

        if distribution_id.is_none() {
            distribution_id = self
                .cloud
                .find_distribution(&bucket_name)
                .await?
                .map(|distribution| distribution.id);
        }

        if let Some(distribution_id) = distribution_id {
            ctx.log_info(format!("Deleting distribution {}", distribution_id));
            self.cloud.delete_distribution(&distribution_id).await?;
        }

        ctx.ensure_running()?;
        ctx.log_info(format!("Deleting bucket {}", bucket_name));
        self.cloud.delete_bucket(&bucket_name).await?;
        Ok(())
    }
}

#[async_trait]
impl Command for DeleteStaticSite {
    fn kind(&self) -> CommandKind {
        CommandKind::DeleteAwsStaticSite
    }

    async fn run(&self, params: ParamMap, ctx: &Context) -> Result<ParamMap, CommandError> {
        let organization_id: String = params.get(ParamKey::OrganizationId)?;
        let deployment_id: String = params.get(ParamKey::DeploymentId)?;

        self.reports.deployments.push(DeploymentStatus::new(
            &organization_id,
            &deployment_id,
            DeploymentState::Deleting,
        ));

        match self
            .delete(&params, &organization_id, &deployment_id, ctx)
            .await
        {
            Ok(()) => {
                self.reports.deployments.push(DeploymentStatus::new(
                    &organization_id,
                    &deployment_id,
                    DeploymentState::Deleted,
                ));
                ctx.log_info("Site deleted");
                Ok(params)
            }
            Err(e) => {
                let mut status = DeploymentStatus::new(
                    &organization_id,
                    &deployment_id,
                    DeploymentState::DeletionFailed,
                );
                status.error = Some(e.to_string());
                self.reports.deployments.push(status);
                Err(e)
            }
        }
    }
}
