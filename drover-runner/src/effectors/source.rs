//! Source control
//!
//! Checkout is clone-or-fetch so running it twice against the same
//! destination leaves one working tree at the requested branch head.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GitError {
    /// The provider rejected the credentials; a refreshed token may help
    #[error("authentication required")]
    AuthRequired,

    #[error("git {command} failed: {stderr}")]
    Failed { command: String, stderr: String },

    #[error("failed to run git: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub clone_url: String,
    pub branch: String,
    pub token: Option<String>,
    pub dest: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutOutcome {
    pub path: PathBuf,
    pub commit_hash: String,
}

#[async_trait]
pub trait SourceControl: Send + Sync {
    async fn checkout(&self, request: &CheckoutRequest) -> Result<CheckoutOutcome, GitError>;
}

/// Runs the `git` binary
pub struct GitCli;

impl GitCli {
    async fn git(dir: Option<&Path>, args: &[&str], token: Option<&str>) -> Result<String, GitError> {
        let mut command = Command::new("git");
        command
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .envs(credential_env(token))
            .kill_on_drop(true);
        if let Some(dir) = dir {
            command.current_dir(dir);
        }

        let output = command.output().await?;
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            if is_auth_failure(&stderr) {
                return Err(GitError::AuthRequired);
            }
            // Never echo a URL that embeds the token
            let verb = args.first().copied().unwrap_or_default();
            return Err(GitError::Failed {
                command: verb.to_string(),
                stderr: redact(&stderr),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

fn is_auth_failure(stderr: &str) -> bool {
    const MARKERS: &[&str] = &[
        "authentication failed",
        "could not read username",
        "invalid username or password",
        "http basic: access denied",
        "the requested url returned error: 401",
        "the requested url returned error: 403",
    ];

    let lower = stderr.to_ascii_lowercase();
    MARKERS.iter().any(|marker| lower.contains(marker))
}

fn redact(text: &str) -> String {
    text.split_whitespace()
        .map(|word| match (word.find("://"), word.find('@')) {
            (Some(scheme), Some(at)) if at > scheme => {
                format!("{}://***{}", &word[..scheme], &word[at..])
            }
            _ => word.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

const TOKEN_VAR: &str = "DROVER_GIT_TOKEN";

// Reads the token from the environment when git asks for https credentials
const CREDENTIAL_HELPER: &str =
    "!f() { echo username=x-access-token; echo \"password=$DROVER_GIT_TOKEN\"; }; f";

/// Environment that hands `token` to git through an inline credential helper
///
/// The token never appears in argv or in the checkout's `.git/config`. The
/// empty first helper clears any helper configured on the host.
fn credential_env(token: Option<&str>) -> Vec<(&'static str, String)> {
    match token {
        Some(token) if !token.is_empty() => vec![
            ("GIT_CONFIG_COUNT", "2".to_string()),
            ("GIT_CONFIG_KEY_0", "credential.helper".to_string()),
            ("GIT_CONFIG_VALUE_0", String::new()),
            ("GIT_CONFIG_KEY_1", "credential.helper".to_string()),
            ("GIT_CONFIG_VALUE_1", CREDENTIAL_HELPER.to_string()),
            (TOKEN_VAR, token.to_string()),
        ],
        _ => Vec::new(),
    }
}

#[async_trait]
impl SourceControl for GitCli {
    async fn checkout(&self, request: &CheckoutRequest) -> Result<CheckoutOutcome, GitError> {
        let url = request.clone_url.as_str();
        let token = request.token.as_deref();
        let dest = request.dest.as_path();

        if dest.join(".git").exists() {
            debug!("Fetching {} into existing checkout", request.branch);
            Self::git(Some(dest), &["remote", "set-url", "origin", url], None).await?;
            Self::git(
                Some(dest),
                &["fetch", "--depth", "1", "origin", request.branch.as_str()],
                token,
            )
            .await?;
            Self::git(
                Some(dest),
                &["checkout", "-B", request.branch.as_str(), "FETCH_HEAD"],
                None,
            )
            .await?;
        } else {
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let dest_str = dest.to_string_lossy();
            Self::git(
                None,
                &[
                    "clone",
                    "--depth",
                    "1",
                    "--branch",
                    request.branch.as_str(),
                    url,
                    dest_str.as_ref(),
                ],
                token,
            )
            .await?;
        }

        let commit_hash = Self::git(Some(dest), &["rev-parse", "HEAD"], None).await?;

        Ok(CheckoutOutcome {
            path: dest.to_path_buf(),
            commit_hash,
        })
    }
}
