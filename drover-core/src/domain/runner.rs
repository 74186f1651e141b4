//! Runner identity
//!
//! Describes the host this runner executes on. Captured once at startup and
//! read-only afterwards.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Identity of the running process, sent with every job poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerIdentity {
    /// Unique id of this runner process
    pub instance_id: String,

    /// Logical service name the runner was started for
    pub service: String,

    pub region: String,

    pub cloud_account_id: String,

    /// CPU architecture (e.g. "x86_64", "aarch64")
    pub arch: String,

    /// OS family (e.g. "linux", "macos")
    pub os: String,

    pub mode: RunnerMode,

    pub target_cloud: TargetCloud,
}

impl RunnerIdentity {
    /// Builds an identity for the current host
    pub fn for_host(
        service: impl Into<String>,
        region: impl Into<String>,
        cloud_account_id: impl Into<String>,
        mode: RunnerMode,
        target_cloud: TargetCloud,
    ) -> Self {
        Self {
            instance_id: uuid::Uuid::new_v4().to_string(),
            service: service.into(),
            region: region.into(),
            cloud_account_id: cloud_account_id.into(),
            arch: std::env::consts::ARCH.to_string(),
            os: std::env::consts::OS.to_string(),
            mode,
            target_cloud,
        }
    }
}

/// Where the runner is hosted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerMode {
    /// Runs inside the customer's cloud account
    Managed,
    /// Runs on a developer machine
    Local,
}

impl std::fmt::Display for RunnerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunnerMode::Managed => write!(f, "managed"),
            RunnerMode::Local => write!(f, "local"),
        }
    }
}

/// Cloud the runner deploys into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetCloud {
    Aws,
    Local,
}

impl std::fmt::Display for TargetCloud {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetCloud::Aws => write!(f, "aws"),
            TargetCloud::Local => write!(f, "local"),
        }
    }
}

impl FromStr for TargetCloud {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aws" => Ok(TargetCloud::Aws),
            "local" => Ok(TargetCloud::Local),
            other => Err(format!("unsupported target cloud: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_for_host() {
        let identity =
            RunnerIdentity::for_host("web", "eu-west-1", "123", RunnerMode::Managed, TargetCloud::Aws);
        assert_eq!(identity.arch, std::env::consts::ARCH);
        assert_eq!(identity.os, std::env::consts::OS);
        assert!(!identity.instance_id.is_empty());
    }

    #[test]
    fn test_target_cloud_parse() {
        assert_eq!("AWS".parse::<TargetCloud>().unwrap(), TargetCloud::Aws);
        assert_eq!("local".parse::<TargetCloud>().unwrap(), TargetCloud::Local);
        assert!("gcp".parse::<TargetCloud>().is_err());
    }
}
