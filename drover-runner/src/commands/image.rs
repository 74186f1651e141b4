//! Container images

use async_trait::async_trait;
use drover_core::domain::command::CommandKind;
use drover_core::domain::params::{ParamKey, ParamMap};
use std::path::PathBuf;
use std::sync::Arc;

use super::{Command, CommandError, Toolkit};
use crate::context::Context;
use crate::effectors::{CloudProvider, ContainerTool};

/// Builds the repository's image unless the tag already exists locally
pub struct BuildImage {
    containers: Arc<dyn ContainerTool>,
}

impl BuildImage {
    pub fn new(toolkit: &Toolkit) -> Self {
        Self {
            containers: Arc::clone(&toolkit.containers),
        }
    }
}

#[async_trait]
impl Command for BuildImage {
    fn kind(&self) -> CommandKind {
        CommandKind::BuildImage
    }

    async fn run(&self, mut params: ParamMap, ctx: &Context) -> Result<ParamMap, CommandError> {
        let repo_path: String = params.get(ParamKey::RepoPath)?;
        let image_name: String = params.get(ParamKey::ImageName)?;
        let image_tag: String = params.get(ParamKey::ImageTag)?;
        let dockerfile: String = params
            .get_opt(ParamKey::DockerfilePath)?
            .unwrap_or_else(|| "Dockerfile".to_string());

        let local_image = format!("{}:{}", image_name, image_tag);

        if self.containers.image_exists(&local_image).await? {
            ctx.log_info(format!("Image {} already built", local_image));
        } else {
            let context_dir = PathBuf::from(&repo_path);
            let dockerfile = context_dir.join(dockerfile);
            ctx.log_info(format!("Building image {}", local_image));
            self.containers
                .build(&context_dir, &dockerfile, &local_image, ctx)
                .await?;
        }

        params.set(ParamKey::LocalImage, local_image);
        Ok(params)
    }
}

/// Pushes the local image into the region's registry
pub struct UploadImageToRegistry {
    cloud: Arc<dyn CloudProvider>,
}

impl UploadImageToRegistry {
    pub fn new(toolkit: &Toolkit) -> Self {
        Self {
            cloud: Arc::clone(&toolkit.cloud),
        }
    }
}

#[async_trait]
impl Command for UploadImageToRegistry {
    fn kind(&self) -> CommandKind {
        CommandKind::UploadImageToRegistry
    }

    async fn run(&self, mut params: ParamMap, ctx: &Context) -> Result<ParamMap, CommandError> {
        let region: String = params.get(ParamKey::Region)?;
        let image_name: String = params.get(ParamKey::ImageName)?;
        let image_tag: String = params.get(ParamKey::ImageTag)?;
        let local_image: String = params.get(ParamKey::LocalImage)?;

        let repository = match self.cloud.find_repository(&region, &image_name).await? {
            Some(repository) => repository,
            None => {
                ctx.log_info(format!("Creating registry repository {}", image_name));
                self.cloud.create_repository(&region, &image_name).await?
            }
        };

        ctx.ensure_running()?;
        match self.cloud.find_image(&repository.uri, &image_tag).await? {
            Some(digest) => ctx.log_info(format!("Tag {} already pushed ({})", image_tag, digest)),
            None => {
                ctx.log_info(format!("Pushing {} to {}", local_image, repository.uri));
                let digest = self
                    .cloud
                    .push_image(&local_image, &repository.uri, &image_tag)
                    .await?;
                ctx.log_info(format!("Pushed {}", digest));
            }
        }

        params.set(
            ParamKey::RegistryUri,
            format!("{}:{}", repository.uri, image_tag),
        );
        Ok(params)
    }
}
