//! Filesystem-backed cloud
//!
//! Used with `TargetCloud=local`. Resource metadata lives in one JSON file
//! (`state.json`) under the state directory; bucket contents are plain
//! directories under `buckets/`. Pushing an image only records a digest.

use async_trait::async_trait;
use drover_core::domain::payload::{RouteTableMap, SubnetMap};
use drover_core::domain::status::CertificateState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use super::cloud::{
    Bucket, Certificate, CloudError, CloudProvider, Cluster, Distribution, Repository, Vpc,
};

#[derive(Debug, Default, Serialize, Deserialize)]
struct CloudState {
    #[serde(default)]
    buckets: BTreeMap<String, Bucket>,
    #[serde(default)]
    distributions: BTreeMap<String, Distribution>,
    #[serde(default)]
    vpcs: BTreeMap<String, Vpc>,
    #[serde(default)]
    clusters: BTreeMap<String, Cluster>,
    #[serde(default)]
    repositories: BTreeMap<String, Repository>,
    /// `<repository uri>:<tag>` → digest
    #[serde(default)]
    images: BTreeMap<String, String>,
    #[serde(default)]
    certificates: BTreeMap<String, Certificate>,
}

pub struct LocalCloud {
    root: PathBuf,
    // Serializes read-modify-write cycles of the state file
    lock: Mutex<()>,
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
}

fn regional(region: &str, name: &str) -> String {
    format!("{}/{}", region, name)
}

impl LocalCloud {
    /// Opens (or creates) the state directory
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CloudError> {
        let root = root.into();
        std::fs::create_dir_all(root.join("buckets"))?;
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    fn state_path(&self) -> PathBuf {
        self.root.join("state.json")
    }

    /// Bucket names become directory names, so only one plain segment is allowed
    fn bucket_dir(&self, name: &str) -> Result<PathBuf, CloudError> {
        let plain = !name.is_empty()
            && name != "."
            && name != ".."
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !plain {
            return Err(CloudError::InvalidName {
                kind: "bucket",
                name: name.to_string(),
            });
        }
        Ok(self.root.join("buckets").join(name))
    }

    async fn load(&self) -> Result<CloudState, CloudError> {
        match tokio::fs::read(self.state_path()).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CloudState::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, state: &CloudState) -> Result<(), CloudError> {
        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = self.root.join("state.json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, self.state_path()).await?;
        Ok(())
    }

    async fn read<T>(&self, f: impl FnOnce(&CloudState) -> T) -> Result<T, CloudError> {
        let _guard = self.lock.lock().await;
        let state = self.load().await?;
        Ok(f(&state))
    }

    async fn update<T>(&self, f: impl FnOnce(&mut CloudState) -> T) -> Result<T, CloudError> {
        let _guard = self.lock.lock().await;
        let mut state = self.load().await?;
        let result = f(&mut state);
        self.save(&state).await?;
        Ok(result)
    }
}

fn copy_tree(source: &Path, dest: &Path) -> std::io::Result<usize> {
    std::fs::create_dir_all(dest)?;
    let mut copied = 0;

    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copied += copy_tree(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }

    Ok(copied)
}

#[async_trait]
impl CloudProvider for LocalCloud {
    async fn find_bucket(&self, _region: &str, name: &str) -> Result<Option<Bucket>, CloudError> {
        self.read(|state| state.buckets.get(name).cloned()).await
    }

    async fn create_bucket(&self, region: &str, name: &str) -> Result<Bucket, CloudError> {
        let dir = self.bucket_dir(name)?;
        tokio::fs::create_dir_all(&dir).await?;

        let bucket = Bucket {
            name: name.to_string(),
            region: region.to_string(),
            location: dir.to_string_lossy().to_string(),
        };
        self.update(|state| {
            state
                .buckets
                .entry(name.to_string())
                .or_insert(bucket)
                .clone()
        })
        .await
    }

    async fn upload_directory(&self, bucket: &str, source: &Path) -> Result<usize, CloudError> {
        let dest = self.bucket_dir(bucket)?;
        let known = self.read(|state| state.buckets.contains_key(bucket)).await?;
        if !known {
            return Err(CloudError::NotFound {
                kind: "bucket",
                id: bucket.to_string(),
            });
        }

        let source = source.to_path_buf();
        let copied = tokio::task::spawn_blocking(move || copy_tree(&source, &dest))
            .await
            .map_err(|e| CloudError::Api(format!("upload task failed: {}", e)))??;

        debug!("Uploaded {} file(s) to bucket {}", copied, bucket);
        Ok(copied)
    }

    async fn delete_bucket(&self, name: &str) -> Result<(), CloudError> {
        let dir = self.bucket_dir(name)?;
        self.update(|state| state.buckets.remove(name)).await?;
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_distribution(&self, bucket: &str) -> Result<Option<Distribution>, CloudError> {
        self.read(|state| {
            state
                .distributions
                .values()
                .find(|distribution| distribution.bucket == bucket)
                .cloned()
        })
        .await
    }

    async fn create_distribution(
        &self,
        bucket: &str,
        alias: Option<&str>,
    ) -> Result<Distribution, CloudError> {
        let id = format!("E{}", short_id().to_uppercase());
        let distribution = Distribution {
            domain: format!("{}.cdn.localhost", id.to_lowercase()),
            id: id.clone(),
            bucket: bucket.to_string(),
            alias: alias.map(str::to_string),
        };

        self.update(|state| {
            state.distributions.insert(id, distribution.clone());
            distribution
        })
        .await
    }

    async fn delete_distribution(&self, id: &str) -> Result<(), CloudError> {
        self.update(|state| state.distributions.remove(id)).await?;
        Ok(())
    }

    async fn find_vpc(&self, region: &str, name: &str) -> Result<Option<Vpc>, CloudError> {
        let key = regional(region, name);
        self.read(|state| state.vpcs.get(&key).cloned()).await
    }

    async fn create_vpc(&self, region: &str, name: &str, cidr: &str) -> Result<Vpc, CloudError> {
        let mut subnets = BTreeMap::new();
        let mut route_tables = BTreeMap::new();
        for zone in ["a", "b"] {
            let subnet = format!("subnet-{}", short_id());
            route_tables.insert(subnet.clone(), format!("rtb-{}", short_id()));
            subnets.insert(format!("{}{}", region, zone), subnet);
        }

        let vpc = Vpc {
            id: format!("vpc-{}", short_id()),
            name: name.to_string(),
            region: region.to_string(),
            cidr: cidr.to_string(),
            subnets: SubnetMap(subnets),
            route_tables: RouteTableMap(route_tables),
        };

        let key = regional(region, name);
        self.update(|state| state.vpcs.entry(key).or_insert(vpc).clone())
            .await
    }

    async fn find_cluster(&self, region: &str, name: &str) -> Result<Option<Cluster>, CloudError> {
        let key = regional(region, name);
        self.read(|state| state.clusters.get(&key).cloned()).await
    }

    async fn create_cluster(
        &self,
        region: &str,
        name: &str,
        vpc_id: Option<&str>,
    ) -> Result<Cluster, CloudError> {
        let cluster = Cluster {
            arn: format!("arn:local:ecs:{}:cluster/{}", region, name),
            name: name.to_string(),
            region: region.to_string(),
            vpc_id: vpc_id.map(str::to_string),
        };

        let key = regional(region, name);
        self.update(|state| state.clusters.entry(key).or_insert(cluster).clone())
            .await
    }

    async fn find_repository(
        &self,
        region: &str,
        name: &str,
    ) -> Result<Option<Repository>, CloudError> {
        let key = regional(region, name);
        self.read(|state| state.repositories.get(&key).cloned()).await
    }

    async fn create_repository(&self, region: &str, name: &str) -> Result<Repository, CloudError> {
        let repository = Repository {
            name: name.to_string(),
            region: region.to_string(),
            uri: format!("registry.{}.localhost/{}", region, name),
        };

        let key = regional(region, name);
        self.update(|state| state.repositories.entry(key).or_insert(repository).clone())
            .await
    }

    async fn find_image(&self, repository_uri: &str, tag: &str) -> Result<Option<String>, CloudError> {
        let key = format!("{}:{}", repository_uri, tag);
        self.read(|state| state.images.get(&key).cloned()).await
    }

    async fn push_image(
        &self,
        local_image: &str,
        repository_uri: &str,
        tag: &str,
    ) -> Result<String, CloudError> {
        let key = format!("{}:{}", repository_uri, tag);
        let digest = format!("sha256:{}", uuid::Uuid::new_v4().simple());
        debug!("Recording {} as {}", local_image, key);

        self.update(|state| state.images.entry(key).or_insert(digest).clone())
            .await
    }

    async fn find_certificate(
        &self,
        region: &str,
        domain: &str,
    ) -> Result<Option<Certificate>, CloudError> {
        let key = regional(region, domain);
        self.read(|state| state.certificates.get(&key).cloned()).await
    }

    async fn request_certificate(
        &self,
        region: &str,
        domain: &str,
    ) -> Result<Certificate, CloudError> {
        let token = short_id();
        let certificate = Certificate {
            arn: format!("arn:local:acm:{}:certificate/{}", region, short_id()),
            domain: domain.to_string(),
            region: region.to_string(),
            status: CertificateState::PendingValidation,
            cname_name: Some(format!("_{}.{}", token, domain)),
            cname_value: Some(format!("_{}.validations.localhost", token)),
        };

        let key = regional(region, domain);
        self.update(|state| state.certificates.entry(key).or_insert(certificate).clone())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bucket_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let cloud = LocalCloud::open(dir.path()).unwrap();

        assert!(cloud.find_bucket("eu-west-1", "site").await.unwrap().is_none());
        let bucket = cloud.create_bucket("eu-west-1", "site").await.unwrap();
        assert_eq!(cloud.find_bucket("eu-west-1", "site").await.unwrap(), Some(bucket));

        let source = tempfile::tempdir().unwrap();
        std::fs::create_dir(source.path().join("assets")).unwrap();
        std::fs::write(source.path().join("index.html"), "<h1>hi</h1>").unwrap();
        std::fs::write(source.path().join("assets/app.js"), "1").unwrap();
        assert_eq!(cloud.upload_directory("site", source.path()).await.unwrap(), 2);
        assert!(dir.path().join("buckets/site/assets/app.js").exists());

        cloud.delete_bucket("site").await.unwrap();
        cloud.delete_bucket("site").await.unwrap();
        assert!(cloud.find_bucket("eu-west-1", "site").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bucket_names_cannot_leave_the_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        let victim = dir.path().join("victim");
        std::fs::create_dir(&victim).unwrap();
        std::fs::write(victim.join("precious.txt"), "keep").unwrap();
        let cloud = LocalCloud::open(dir.path().join("state")).unwrap();

        for name in ["../../victim", "..", "a/b", ""] {
            let err = cloud.delete_bucket(name).await.unwrap_err();
            assert!(matches!(err, CloudError::InvalidName { kind: "bucket", .. }), "{}", name);
        }
        assert!(victim.join("precious.txt").exists());

        let err = cloud.create_bucket("eu-west-1", "../escape").await.unwrap_err();
        assert!(matches!(err, CloudError::InvalidName { .. }));
        assert!(!dir.path().join("escape").exists());
        assert!(cloud.upload_directory("../victim", dir.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_upload_to_missing_bucket_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cloud = LocalCloud::open(dir.path()).unwrap();

        let err = cloud.upload_directory("nope", dir.path()).await.unwrap_err();
        assert!(matches!(err, CloudError::NotFound { kind: "bucket", .. }));
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cloud = LocalCloud::open(dir.path()).unwrap();

        let first = cloud.create_cluster("eu-west-1", "apps", None).await.unwrap();
        let second = cloud.create_cluster("eu-west-1", "apps", None).await.unwrap();
        assert_eq!(first, second);

        let vpc = cloud.create_vpc("eu-west-1", "main", "10.0.0.0/16").await.unwrap();
        assert_eq!(vpc.subnets.0.len(), 2);
        assert_eq!(
            cloud.create_vpc("eu-west-1", "main", "10.0.0.0/16").await.unwrap().id,
            vpc.id
        );
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let repository = {
            let cloud = LocalCloud::open(dir.path()).unwrap();
            let repository = cloud.create_repository("eu-west-1", "web").await.unwrap();
            cloud.push_image("web:1", &repository.uri, "1").await.unwrap();
            repository
        };

        let cloud = LocalCloud::open(dir.path()).unwrap();
        assert!(cloud.find_image(&repository.uri, "1").await.unwrap().is_some());
        assert!(cloud.find_image(&repository.uri, "2").await.unwrap().is_none());
    }
}
