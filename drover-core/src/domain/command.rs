//! Command-kind tags
//!
//! Jobs carry their plan as a list of integer tags. The integers are part of
//! the wire contract with the orchestrator and must never be renumbered.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum CommandKind {
    CheckoutRepo,
    BuildStaticSite,
    DeployAwsStaticSite,
    DeleteAwsStaticSite,
    EnsureVpc,
    CreateCluster,
    BuildImage,
    UploadImageToRegistry,
    RequestCertificate,
    ReportAgentResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown command kind: {0}")]
pub struct UnknownCommandKind(pub i32);

impl CommandKind {
    /// Every kind, in tag order
    pub const ALL: [CommandKind; 10] = [
        CommandKind::CheckoutRepo,
        CommandKind::BuildStaticSite,
        CommandKind::DeployAwsStaticSite,
        CommandKind::DeleteAwsStaticSite,
        CommandKind::EnsureVpc,
        CommandKind::CreateCluster,
        CommandKind::BuildImage,
        CommandKind::UploadImageToRegistry,
        CommandKind::RequestCertificate,
        CommandKind::ReportAgentResult,
    ];

    pub fn tag(self) -> i32 {
        match self {
            CommandKind::CheckoutRepo => 0,
            CommandKind::BuildStaticSite => 1,
            CommandKind::DeployAwsStaticSite => 2,
            CommandKind::DeleteAwsStaticSite => 3,
            CommandKind::EnsureVpc => 4,
            CommandKind::CreateCluster => 5,
            CommandKind::BuildImage => 6,
            CommandKind::UploadImageToRegistry => 7,
            CommandKind::RequestCertificate => 8,
            CommandKind::ReportAgentResult => 9,
        }
    }
}

impl TryFrom<i32> for CommandKind {
    type Error = UnknownCommandKind;

    fn try_from(tag: i32) -> Result<Self, Self::Error> {
        CommandKind::ALL
            .into_iter()
            .find(|kind| kind.tag() == tag)
            .ok_or(UnknownCommandKind(tag))
    }
}

impl From<CommandKind> for i32 {
    fn from(kind: CommandKind) -> Self {
        kind.tag()
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}
