//! Cloud provider contract
//!
//! Commands reach cloud resources only through these describe/create/delete
//! primitives. Every `find_*` returns `None` for a missing resource so
//! commands can describe before they create.

use async_trait::async_trait;
use drover_core::domain::payload::{RouteTableMap, SubnetMap};
use drover_core::domain::status::CertificateState;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CloudError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("{0}")]
    Api(String),

    #[error("invalid {kind} name {name:?}")]
    InvalidName { kind: &'static str, name: String },

    #[error("cloud state i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cloud state is unreadable: {0}")]
    State(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,
    pub region: String,
    /// Where objects of the bucket are served from
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub id: String,
    pub domain: String,
    pub bucket: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vpc {
    pub id: String,
    pub name: String,
    pub region: String,
    pub cidr: String,
    pub subnets: SubnetMap,
    pub route_tables: RouteTableMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub arn: String,
    pub name: String,
    pub region: String,
    pub vpc_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub region: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub arn: String,
    pub domain: String,
    pub region: String,
    pub status: CertificateState,
    pub cname_name: Option<String>,
    pub cname_value: Option<String>,
}

#[async_trait]
pub trait CloudProvider: Send + Sync {
    // Static sites
    async fn find_bucket(&self, region: &str, name: &str) -> Result<Option<Bucket>, CloudError>;

    async fn create_bucket(&self, region: &str, name: &str) -> Result<Bucket, CloudError>;

    /// Copies every file under `source` into the bucket; returns the file count
    async fn upload_directory(&self, bucket: &str, source: &Path) -> Result<usize, CloudError>;

    /// Deleting a missing bucket succeeds
    async fn delete_bucket(&self, name: &str) -> Result<(), CloudError>;

    async fn find_distribution(&self, bucket: &str) -> Result<Option<Distribution>, CloudError>;

    async fn create_distribution(
        &self,
        bucket: &str,
        alias: Option<&str>,
    ) -> Result<Distribution, CloudError>;

    /// Deleting a missing distribution succeeds
    async fn delete_distribution(&self, id: &str) -> Result<(), CloudError>;

    // Networking and compute
    async fn find_vpc(&self, region: &str, name: &str) -> Result<Option<Vpc>, CloudError>;

    async fn create_vpc(&self, region: &str, name: &str, cidr: &str) -> Result<Vpc, CloudError>;

    async fn find_cluster(&self, region: &str, name: &str) -> Result<Option<Cluster>, CloudError>;

    async fn create_cluster(
        &self,
        region: &str,
        name: &str,
        vpc_id: Option<&str>,
    ) -> Result<Cluster, CloudError>;

    // Images
    async fn find_repository(
        &self,
        region: &str,
        name: &str,
    ) -> Result<Option<Repository>, CloudError>;

    async fn create_repository(&self, region: &str, name: &str) -> Result<Repository, CloudError>;

    /// Digest of `tag` in the repository, if pushed
    async fn find_image(&self, repository_uri: &str, tag: &str) -> Result<Option<String>, CloudError>;

    async fn push_image(
        &self,
        local_image: &str,
        repository_uri: &str,
        tag: &str,
    ) -> Result<String, CloudError>;

    // Certificates
    async fn find_certificate(
        &self,
        region: &str,
        domain: &str,
    ) -> Result<Option<Certificate>, CloudError>;

    async fn request_certificate(&self, region: &str, domain: &str)
    -> Result<Certificate, CloudError>;
}
