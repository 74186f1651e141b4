//! Runner configuration
//!
//! Settings come from command-line flags, each of which can also be set
//! through the environment variables the hosting platform injects. Two
//! modes exist: managed (an organization token issued by the orchestrator)
//! and local (a user key of the form `<user>:<org>` plus a secret).

use clap::Parser;
use drover_core::domain::runner::{RunnerMode, TargetCloud};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Fatal configuration problems
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid user key, expected <user>:<organization>")]
    InvalidUserKey,

    #[error("orchestrator_url must start with http:// or https://")]
    InvalidUrl,

    #[error("{0} must be greater than 0")]
    Zero(&'static str),

    #[error("target cloud '{0}' has no effector in this build")]
    UnsupportedTarget(TargetCloud),

    #[error("{0}")]
    TargetCloud(String),
}

/// Raw flags and environment
#[derive(Debug, Clone, Parser)]
#[command(name = "drover-runner")]
#[command(about = "Deployment runner that executes orchestrator jobs", long_about = None)]
pub struct RunnerArgs {
    /// Orchestrator base URL
    #[arg(long, env = "OrchestratorURL", default_value = "http://localhost:8080")]
    pub orchestrator_url: String,

    /// Logical service name reported with every poll
    #[arg(long, env = "Service", default_value = "")]
    pub service: String,

    #[arg(long, env = "OrganizationID")]
    pub organization_id: Option<String>,

    #[arg(long, env = "Token", hide_env_values = true)]
    pub token: Option<String>,

    #[arg(long, env = "Region", default_value = "")]
    pub region: String,

    #[arg(long, env = "AWSAccountID", default_value = "")]
    pub aws_account_id: String,

    /// Cloud the jobs are executed against (aws or local)
    #[arg(long, env = "TargetCloud")]
    pub target_cloud: Option<String>,

    /// Local mode identity, `<user>:<organization>`
    #[arg(long, env = "UserKey")]
    pub user_key: Option<String>,

    #[arg(long, env = "UserSecret", hide_env_values = true)]
    pub user_secret: Option<String>,

    #[arg(long, env = "PollIntervalSecs", default_value_t = 10)]
    pub poll_interval_secs: u64,

    #[arg(long, env = "Workers", default_value_t = 5)]
    pub workers: usize,

    #[arg(long, env = "Forwarders", default_value_t = 5)]
    pub forwarders: usize,

    #[arg(long, env = "HeartbeatIntervalSecs", default_value_t = 30)]
    pub heartbeat_interval_secs: u64,

    #[arg(long, env = "PingIntervalSecs", default_value_t = 5)]
    pub ping_interval_secs: u64,

    /// Parent directory of per-job checkouts
    #[arg(long, env = "WorkspaceRoot", default_value = "/tmp")]
    pub workspace_root: PathBuf,

    /// State directory of the filesystem-backed cloud
    #[arg(long, env = "LocalCloudDir", default_value = "/tmp/drover-cloud")]
    pub local_cloud_dir: PathBuf,

    #[arg(long, env = "ClientCertPem")]
    pub client_cert_pem: Option<PathBuf>,

    #[arg(long, env = "ClientKeyPem")]
    pub client_key_pem: Option<PathBuf>,

    #[arg(long, env = "CaCertPem")]
    pub ca_cert_pem: Option<PathBuf>,
}

/// PEM file locations for a mutually authenticated channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
    pub ca: Option<PathBuf>,
}

/// Resolved runner configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub orchestrator_url: String,
    pub organization_id: String,
    pub token: String,
    pub mode: RunnerMode,
    pub target_cloud: TargetCloud,
    pub service: String,
    pub region: String,
    pub cloud_account_id: String,

    /// Wait between polls that returned nothing
    pub poll_interval: Duration,
    pub workers: usize,
    pub forwarders: usize,
    pub heartbeat_interval: Duration,
    pub ping_interval: Duration,

    pub workspace_root: PathBuf,
    pub local_cloud_dir: PathBuf,
    pub tls: Option<TlsPaths>,
}

impl Config {
    /// Creates a managed-mode configuration with defaults
    pub fn new(orchestrator_url: String, organization_id: String, token: String) -> Self {
        Self {
            orchestrator_url,
            organization_id,
            token,
            mode: RunnerMode::Managed,
            target_cloud: TargetCloud::Aws,
            service: String::new(),
            region: String::new(),
            cloud_account_id: String::new(),
            poll_interval: Duration::from_secs(10),
            workers: 5,
            forwarders: 5,
            heartbeat_interval: Duration::from_secs(30),
            ping_interval: Duration::from_secs(5),
            workspace_root: PathBuf::from("/tmp"),
            local_cloud_dir: PathBuf::from("/tmp/drover-cloud"),
            tls: None,
        }
    }

    /// Resolves the mode and credentials from parsed arguments
    ///
    /// A user key selects local mode; otherwise the organization id and
    /// token are required.
    pub fn from_args(args: RunnerArgs) -> Result<Self, ConfigError> {
        let (mode, organization_id, token) = match &args.user_key {
            Some(user_key) => {
                let (user, organization) = user_key
                    .split_once(':')
                    .ok_or(ConfigError::InvalidUserKey)?;
                if user.is_empty() || organization.is_empty() {
                    return Err(ConfigError::InvalidUserKey);
                }
                let secret = args
                    .user_secret
                    .clone()
                    .ok_or(ConfigError::Missing("UserSecret"))?;
                (RunnerMode::Local, organization.to_string(), secret)
            }
            None => {
                let organization_id = args
                    .organization_id
                    .clone()
                    .ok_or(ConfigError::Missing("OrganizationID"))?;
                let token = args.token.clone().ok_or(ConfigError::Missing("Token"))?;
                (RunnerMode::Managed, organization_id, token)
            }
        };

        let target_cloud = match args.target_cloud.as_deref() {
            Some(raw) => raw.parse().map_err(ConfigError::TargetCloud)?,
            None if mode == RunnerMode::Local => TargetCloud::Local,
            None => TargetCloud::Aws,
        };

        let tls = match (args.client_cert_pem, args.client_key_pem) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert,
                key,
                ca: args.ca_cert_pem,
            }),
            (Some(_), None) => return Err(ConfigError::Missing("ClientKeyPem")),
            (None, Some(_)) => return Err(ConfigError::Missing("ClientCertPem")),
            (None, None) => None,
        };

        Ok(Self {
            mode,
            target_cloud,
            service: args.service,
            region: args.region,
            cloud_account_id: args.aws_account_id,
            poll_interval: Duration::from_secs(args.poll_interval_secs),
            workers: args.workers,
            forwarders: args.forwarders,
            heartbeat_interval: Duration::from_secs(args.heartbeat_interval_secs),
            ping_interval: Duration::from_secs(args.ping_interval_secs),
            workspace_root: args.workspace_root,
            local_cloud_dir: args.local_cloud_dir,
            tls,
            ..Self::new(args.orchestrator_url, organization_id, token)
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.organization_id.is_empty() {
            return Err(ConfigError::Missing("OrganizationID"));
        }

        if self.token.is_empty() {
            return Err(ConfigError::Missing("Token"));
        }

        if !self.orchestrator_url.starts_with("http://")
            && !self.orchestrator_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidUrl);
        }

        if self.poll_interval.is_zero() {
            return Err(ConfigError::Zero("poll_interval"));
        }

        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::Zero("heartbeat_interval"));
        }

        if self.ping_interval.is_zero() {
            return Err(ConfigError::Zero("ping_interval"));
        }

        if self.workers == 0 {
            return Err(ConfigError::Zero("workers"));
        }

        if self.forwarders == 0 {
            return Err(ConfigError::Zero("forwarders"));
        }

        // Only the filesystem-backed cloud ships with this binary
        if self.target_cloud != TargetCloud::Local {
            return Err(ConfigError::UnsupportedTarget(self.target_cloud));
        }

        Ok(())
    }
}
