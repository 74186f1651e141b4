use async_trait::async_trait;
use drover_core::domain::command::CommandKind;
use drover_core::domain::params::{ParamError, ParamKey, ParamMap};
use drover_core::domain::payload::{AgentData, AutomationData};
use drover_core::domain::status::{AgentResponse, AutomationResponse};
use std::sync::Arc;

use super::{Command, CommandError, Toolkit};
use crate::context::Context;
use crate::reporting::ReportPipelines;

/// Hands the output of an agent run back to whoever asked for it
///
/// An agent request gets an agent response, an automation run gets an
/// automation response; a job may carry both.
pub struct ReportAgentResult {
    reports: Arc<ReportPipelines>,
}

impl ReportAgentResult {
    pub fn new(toolkit: &Toolkit) -> Self {
        Self {
            reports: Arc::clone(&toolkit.reports),
        }
    }
}

#[async_trait]
impl Command for ReportAgentResult {
    fn kind(&self) -> CommandKind {
        CommandKind::ReportAgentResult
    }

    async fn run(&self, params: ParamMap, ctx: &Context) -> Result<ParamMap, CommandError> {
        let organization_id: String = params.get(ParamKey::OrganizationId)?;
        let content: String = params.get(ParamKey::AgentOutput)?;
        let agent: Option<AgentData> = params.get_opt(ParamKey::Agent)?;
        let automation: Option<AutomationData> = params.get_opt(ParamKey::Automation)?;

        if agent.is_none() && automation.is_none() {
            return Err(ParamError::Missing {
                key: ParamKey::Agent,
            }
            .into());
        }

        if let Some(agent) = agent {
            ctx.log_info(format!("Reporting result to agent {}", agent.agent_id));
            self.reports.agent_responses.push(AgentResponse {
                organization_id: organization_id.clone(),
                agent_id: agent.agent_id,
                job_id: ctx.job_id().to_string(),
                content: content.clone(),
            });
        }

        if let Some(automation) = automation {
            ctx.log_info(format!("Reporting result to automation {}", automation.name));
            self.reports.automation_responses.push(AutomationResponse {
                organization_id,
                automation_id: automation.automation_id,
                job_id: ctx.job_id().to_string(),
                content,
            });
        }

        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{job_context, toolkit};

    #[tokio::test]
    async fn test_reports_agent_and_automation() {
        let (toolkit, fakes) = toolkit();
        let (ctx, _root) = job_context(&fakes, "j1");
        let params = ParamMap::new()
            .with(ParamKey::OrganizationId, "org1".to_string())
            .with(ParamKey::AgentOutput, "all green".to_string())
            .with(
                ParamKey::Agent,
                AgentData {
                    agent_id: "a1".to_string(),
                    conversation_id: None,
                    prompt: "check the site".to_string(),
                },
            )
            .with(
                ParamKey::Automation,
                AutomationData {
                    automation_id: "auto1".to_string(),
                    name: "nightly".to_string(),
                    run_id: None,
                },
            );

        ReportAgentResult::new(&toolkit).run(params, &ctx).await.unwrap();

        fakes.reports.shutdown().await;
        let agents = fakes.plane.agent_responses();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].content, "all green");
        assert_eq!(agents[0].job_id, "j1");
        assert_eq!(fakes.plane.automation_responses()[0].automation_id, "auto1");
    }

    #[tokio::test]
    async fn test_requires_a_recipient() {
        let (toolkit, fakes) = toolkit();
        let (ctx, _root) = job_context(&fakes, "j1");
        let params = ParamMap::new()
            .with(ParamKey::OrganizationId, "org1".to_string())
            .with(ParamKey::AgentOutput, "x".to_string());

        let err = ReportAgentResult::new(&toolkit).run(params, &ctx).await.unwrap_err();
        assert!(matches!(err, CommandError::Param(ParamError::Missing { .. })));
    }
}
