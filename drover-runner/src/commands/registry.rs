//! Command registry
//!
//! Maps the integer tags jobs carry to command factories. The factory table
//! is built once per process; [`Registry::init`] may be called any number of
//! times.

use drover_core::domain::command::CommandKind;
use drover_core::domain::params::{ParamType, ParamValue};
use drover_core::domain::payload::{
    AgentData, AutomationData, DeploymentData, PreviewData, RouteTableMap, SubnetMap,
};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::{debug, error};

use super::agent::ReportAgentResult;
use super::certificate::RequestCertificate;
use super::checkout::CheckoutRepo;
use super::image::{BuildImage, UploadImageToRegistry};
use super::network::{CreateCluster, EnsureVpc};
use super::static_site::{BuildStaticSite, DeleteStaticSite, DeployStaticSite};
use super::{Command, CommandError, Toolkit};

type Factory = fn(&Toolkit) -> Box<dyn Command>;

static FACTORIES: OnceLock<Vec<(CommandKind, Factory)>> = OnceLock::new();

/// Type names every parameter value variant must map to
fn known_param_types() -> [&'static str; 11] {
    [
        <bool as ParamType>::TYPE_NAME,
        <i64 as ParamType>::TYPE_NAME,
        <String as ParamType>::TYPE_NAME,
        <Vec<String> as ParamType>::TYPE_NAME,
        <BTreeMap<String, String> as ParamType>::TYPE_NAME,
        AgentData::TYPE_NAME,
        AutomationData::TYPE_NAME,
        DeploymentData::TYPE_NAME,
        PreviewData::TYPE_NAME,
        SubnetMap::TYPE_NAME,
        RouteTableMap::TYPE_NAME,
    ]
}

macro_rules! factory {
    ($command:ident) => {
        |toolkit: &Toolkit| -> Box<dyn Command> { Box::new($command::new(toolkit)) }
    };
}

fn factory(kind: CommandKind) -> Factory {
    match kind {
        CommandKind::CheckoutRepo => factory!(CheckoutRepo),
        CommandKind::BuildStaticSite => factory!(BuildStaticSite),
        CommandKind::DeployAwsStaticSite => factory!(DeployStaticSite),
        CommandKind::DeleteAwsStaticSite => factory!(DeleteStaticSite),
        CommandKind::EnsureVpc => factory!(EnsureVpc),
        CommandKind::CreateCluster => factory!(CreateCluster),
        CommandKind::BuildImage => factory!(BuildImage),
        CommandKind::UploadImageToRegistry => factory!(UploadImageToRegistry),
        CommandKind::RequestCertificate => factory!(RequestCertificate),
        CommandKind::ReportAgentResult => factory!(ReportAgentResult),
    }
}

/// Resolves command tags for the job runner
pub struct Registry {
    toolkit: Toolkit,
}

impl Registry {
    /// Builds the factory table and checks the parameter type registrations
    ///
    /// Returns the number of registered commands. Idempotent.
    pub fn init() -> usize {
        FACTORIES
            .get_or_init(|| {
                let decodable = ParamValue::registered_types();
                for name in known_param_types() {
                    if !decodable.contains(&name) {
                        error!("Parameter type {} is not decodable", name);
                    }
                }

                let table: Vec<(CommandKind, Factory)> = CommandKind::ALL
                    .iter()
                    .map(|kind| (*kind, factory(*kind)))
                    .collect();
                debug!("Registered {} command(s)", table.len());
                table
            })
            .len()
    }

    pub fn new(toolkit: Toolkit) -> Self {
        Self::init();
        Self { toolkit }
    }

    /// Instantiates the command for a tag
    ///
    /// # Errors
    /// [`CommandError::UnsupportedCommand`] for tags with no registered command
    pub fn get(&self, tag: i32) -> Result<Box<dyn Command>, CommandError> {
        let kind = CommandKind::try_from(tag).map_err(|_| CommandError::UnsupportedCommand(tag))?;

        let factories = FACTORIES.get_or_init(Vec::new);
        factories
            .iter()
            .find(|(registered, _)| *registered == kind)
            .map(|(_, factory)| factory(&self.toolkit))
            .ok_or(CommandError::UnsupportedCommand(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::toolkit;

    #[test]
    fn test_init_is_idempotent() {
        let first = Registry::init();
        let second = Registry::init();
        assert_eq!(first, CommandKind::ALL.len());
        assert_eq!(first, second);
    }

    #[test]
    fn test_param_types_are_decodable() {
        let decodable = ParamValue::registered_types();
        for name in known_param_types() {
            assert!(decodable.contains(&name), "{} not decodable", name);
        }
    }

    #[tokio::test]
    async fn test_get_resolves_every_tag() {
        let (toolkit, _fakes) = toolkit();
        let registry = Registry::new(toolkit);

        for kind in CommandKind::ALL {
            let command = registry.get(kind.tag()).unwrap();
            assert_eq!(command.kind(), kind);
        }
    }

    #[tokio::test]
    async fn test_unknown_tag_is_unsupported() {
        let (toolkit, _fakes) = toolkit();
        let registry = Registry::new(toolkit);

        let err = registry.get(99).err().unwrap();
        assert!(matches!(err, CommandError::UnsupportedCommand(99)));
        assert_eq!(err.to_string(), "tool/command type not supported");
    }
}
