//! Parameter map threaded through the commands of a job
//!
//! Keys come from the closed [`ParamKey`] set and values from the closed
//! [`ParamValue`] sum type. Typed reads go through [`ParamType`], so a command
//! asking for the wrong shape gets a [`ParamError`] instead of a panic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::domain::payload::{
    AgentData, AutomationData, DeploymentData, PreviewData, RouteTableMap, SubnetMap,
};

/// Well-known parameter keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKey {
    OrganizationId,
    DeploymentId,
    BuildId,
    PreviewId,
    RepoCloneUrl,
    RepoBranch,
    RepoProviderToken,
    InstallationId,
    CommitHash,
    RepoPath,
    BuildCommand,
    PublishDirectory,
    Region,
    BucketName,
    BucketLocation,
    DistributionId,
    DistributionDomain,
    SiteUrl,
    DomainName,
    CertificateArn,
    VpcId,
    VpcCidr,
    SubnetMap,
    RouteTableMap,
    ClusterName,
    EcsClusterArn,
    ImageName,
    ImageTag,
    LocalImage,
    RegistryUri,
    DockerfilePath,
    Agent,
    Automation,
    AgentOutput,
    Deployment,
    Preview,
}

impl ParamKey {
    /// Wire name of the key
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKey::OrganizationId => "organization_id",
            ParamKey::DeploymentId => "deployment_id",
            ParamKey::BuildId => "build_id",
            ParamKey::PreviewId => "preview_id",
            ParamKey::RepoCloneUrl => "repo_clone_url",
            ParamKey::RepoBranch => "repo_branch",
            ParamKey::RepoProviderToken => "repo_provider_token",
            ParamKey::InstallationId => "installation_id",
            ParamKey::CommitHash => "commit_hash",
            ParamKey::RepoPath => "repo_path",
            ParamKey::BuildCommand => "build_command",
            ParamKey::PublishDirectory => "publish_directory",
            ParamKey::Region => "region",
            ParamKey::BucketName => "bucket_name",
            ParamKey::BucketLocation => "bucket_location",
            ParamKey::DistributionId => "distribution_id",
            ParamKey::DistributionDomain => "distribution_domain",
            ParamKey::SiteUrl => "site_url",
            ParamKey::DomainName => "domain_name",
            ParamKey::CertificateArn => "certificate_arn",
            ParamKey::VpcId => "vpc_id",
            ParamKey::VpcCidr => "vpc_cidr",
            ParamKey::SubnetMap => "subnet_map",
            ParamKey::RouteTableMap => "route_table_map",
            ParamKey::ClusterName => "cluster_name",
            ParamKey::EcsClusterArn => "ecs_cluster_arn",
            ParamKey::ImageName => "image_name",
            ParamKey::ImageTag => "image_tag",
            ParamKey::LocalImage => "local_image",
            ParamKey::RegistryUri => "registry_uri",
            ParamKey::DockerfilePath => "dockerfile_path",
            ParamKey::Agent => "agent",
            ParamKey::Automation => "automation",
            ParamKey::AgentOutput => "agent_output",
            ParamKey::Deployment => "deployment",
            ParamKey::Preview => "preview",
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parameter value
///
/// Every shape that may travel inside a job payload is a variant here, so the
/// decoder can always reconstruct what a previous command (or the server)
/// wrote. Wire form: `{"type": "<tag>", "value": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Str(String),
    StrList(Vec<String>),
    StrMap(BTreeMap<String, String>),
    Agent(AgentData),
    Automation(AutomationData),
    Deployment(DeploymentData),
    Preview(PreviewData),
    SubnetMap(SubnetMap),
    RouteTableMap(RouteTableMap),
}

/// Type tags accepted by the [`ParamValue`] decoder, in declaration order
const REGISTERED_TYPES: &[&str] = &[
    "bool",
    "int",
    "str",
    "str_list",
    "str_map",
    "agent",
    "automation",
    "deployment",
    "preview",
    "subnet_map",
    "route_table_map",
];

impl ParamValue {
    /// Type tag of this value as it appears on the wire
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Str(_) => "str",
            ParamValue::StrList(_) => "str_list",
            ParamValue::StrMap(_) => "str_map",
            ParamValue::Agent(_) => "agent",
            ParamValue::Automation(_) => "automation",
            ParamValue::Deployment(_) => "deployment",
            ParamValue::Preview(_) => "preview",
            ParamValue::SubnetMap(_) => "subnet_map",
            ParamValue::RouteTableMap(_) => "route_table_map",
        }
    }

    /// All type tags the decoder understands
    pub fn registered_types() -> &'static [&'static str] {
        REGISTERED_TYPES
    }
}

/// Errors raised by typed parameter access
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("missing parameter: {key}")]
    Missing { key: ParamKey },

    #[error("parameter {key} has type {found}, expected {expected}")]
    Mistyped {
        key: ParamKey,
        expected: &'static str,
        found: &'static str,
    },
}

/// Conversion between a Rust type and a [`ParamValue`] variant
pub trait ParamType: Sized {
    const TYPE_NAME: &'static str;

    fn from_value(value: &ParamValue) -> Option<Self>;

    fn into_value(self) -> ParamValue;
}

macro_rules! param_type {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl ParamType for $ty {
            const TYPE_NAME: &'static str = $name;

            fn from_value(value: &ParamValue) -> Option<Self> {
                match value {
                    ParamValue::$variant(inner) => Some(inner.clone()),
                    _ => None,
                }
            }

            fn into_value(self) -> ParamValue {
                ParamValue::$variant(self)
            }
        }
    };
}

param_type!(bool, Bool, "bool");
param_type!(i64, Int, "int");
param_type!(String, Str, "str");
param_type!(Vec<String>, StrList, "str_list");
param_type!(BTreeMap<String, String>, StrMap, "str_map");
param_type!(AgentData, Agent, "agent");
param_type!(AutomationData, Automation, "automation");
param_type!(DeploymentData, Deployment, "deployment");
param_type!(PreviewData, Preview, "preview");
param_type!(SubnetMap, SubnetMap, "subnet_map");
param_type!(RouteTableMap, RouteTableMap, "route_table_map");

/// The mutable key/value store owned by one job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamMap(BTreeMap<ParamKey, ParamValue>);

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Typed read that fails when the key is absent or holds another type
    pub fn get<T: ParamType>(&self, key: ParamKey) -> Result<T, ParamError> {
        self.get_opt(key)?.ok_or(ParamError::Missing { key })
    }

    /// Typed read where absence is not an error, but a wrong type still is
    pub fn get_opt<T: ParamType>(&self, key: ParamKey) -> Result<Option<T>, ParamError> {
        match self.0.get(&key) {
            None => Ok(None),
            Some(value) => T::from_value(value)
                .map(Some)
                .ok_or(ParamError::Mistyped {
                    key,
                    expected: T::TYPE_NAME,
                    found: value.type_name(),
                }),
        }
    }

    /// Writes a value, replacing whatever was stored under the key
    pub fn set<T: ParamType>(&mut self, key: ParamKey, value: T) {
        self.0.insert(key, value.into_value());
    }

    /// Builder-style [`ParamMap::set`]
    pub fn with<T: ParamType>(mut self, key: ParamKey, value: T) -> Self {
        self.set(key, value);
        self
    }

    pub fn remove(&mut self, key: ParamKey) -> Option<ParamValue> {
        self.0.remove(&key)
    }
}
