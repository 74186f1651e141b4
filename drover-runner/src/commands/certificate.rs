use async_trait::async_trait;
use drover_core::domain::command::CommandKind;
use drover_core::domain::params::{ParamKey, ParamMap};
use drover_core::domain::status::{
    CertificateState, CertificateUpdate, Notification, NotificationLevel,
};
use std::sync::Arc;

use super::{Command, CommandError, Toolkit};
use crate::context::Context;
use crate::effectors::CloudProvider;
use crate::reporting::ReportPipelines;

/// Explains why `domain` cannot carry a certificate, if it cannot
///
/// The domain is typed by the user, so the explanation is meant for them.
fn domain_problem(domain: &str) -> Option<String> {
    let host = domain.strip_prefix("*.").unwrap_or(domain);
    if host.is_empty() {
        return Some("The domain name is empty.".to_string());
    }
    if host.len() > 253 {
        return Some(format!("The domain name {} is longer than 253 characters.", domain));
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return Some(format!(
            "The domain name {} needs at least one dot, like example.com.",
            domain
        ));
    }

    for label in labels {
        let valid = !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            return Some(format!(
                "The domain name {} has an invalid part \"{}\": use letters, digits and inner hyphens only.",
                domain, label
            ));
        }
    }

    None
}

/// Requests (or finds) a TLS certificate and publishes its DNS validation record
///
/// A malformed domain is reported to the user as a warning notification and
/// the job carries on without a certificate.
pub struct RequestCertificate {
    cloud: Arc<dyn CloudProvider>,
    reports: Arc<ReportPipelines>,
}

impl RequestCertificate {
    pub fn new(toolkit: &Toolkit) -> Self {
        Self {
            cloud: Arc::clone(&toolkit.cloud),
            reports: Arc::clone(&toolkit.reports),
        }
    }
}

#[async_trait]
impl Command for RequestCertificate {
    fn kind(&self) -> CommandKind {
        CommandKind::RequestCertificate
    }

    async fn run(&self, mut params: ParamMap, ctx: &Context) -> Result<ParamMap, CommandError> {
        let organization_id: String = params.get(ParamKey::OrganizationId)?;
        let region: String = params.get(ParamKey::Region)?;
        let domain: String = params.get(ParamKey::DomainName)?;

        if let Some(problem) = domain_problem(&domain) {
            ctx.log_warning(format!("Skipping certificate request: {}", problem));
            self.reports.notifications.push(Notification {
                organization_id,
                title: format!("Cannot request a certificate for {}", domain),
                body: problem,
                level: NotificationLevel::Warning,
            });
            return Ok(params);
        }

        let certificate = match self.cloud.find_certificate(&region, &domain).await? {
            Some(certificate) => certificate,
            None => {
                ctx.log_info(format!("Requesting certificate for {}", domain));
                self.cloud.request_certificate(&region, &domain).await?
            }
        };

        ctx.log_info(format!(
            "Certificate {} is {:?}",
            certificate.arn, certificate.status
        ));

        self.reports.certificates.push(CertificateUpdate {
            organization_id: organization_id.clone(),
            certificate_arn: certificate.arn.clone(),
            domain: domain.clone(),
            status: certificate.status,
            cname_name: certificate.cname_name.clone(),
            cname_value: certificate.cname_value.clone(),
        });

        if certificate.status == CertificateState::PendingValidation {
            if let (Some(name), Some(value)) = (&certificate.cname_name, &certificate.cname_value) {
                self.reports.notifications.push(Notification {
                    organization_id,
                    title: format!("Validate the certificate for {}", domain),
                    body: format!("Create a CNAME record {} pointing to {}", name, value),
                    level: NotificationLevel::Info,
                });
            }
        }

        params.set(ParamKey::CertificateArn, certificate.arn);
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{job_context, toolkit};

    #[tokio::test]
    async fn test_request_certificate_publishes_cname() {
        let (toolkit, fakes) = toolkit();
        let (ctx, _root) = job_context(&fakes, "j1");
        let params = ParamMap::new()
            .with(ParamKey::OrganizationId, "org1".to_string())
            .with(ParamKey::Region, "us-east-1".to_string())
            .with(ParamKey::DomainName, "www.example.com".to_string());

        let command = RequestCertificate::new(&toolkit);
        let first = command.run(params.clone(), &ctx).await.unwrap();
        let second = command.run(params, &ctx).await.unwrap();
        assert_eq!(
            first.get::<String>(ParamKey::CertificateArn).unwrap(),
            second.get::<String>(ParamKey::CertificateArn).unwrap()
        );
        assert_eq!(fakes.cloud.count("request_certificate"), 1);

        fakes.reports.shutdown().await;
        let updates = fakes.plane.certificate_updates();
        assert_eq!(updates.len(), 2);
        assert!(updates[0].cname_name.is_some());
        assert_eq!(fakes.plane.notifications().len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_domain_is_explained_not_failed() {
        let (toolkit, fakes) = toolkit();
        let (ctx, _root) = job_context(&fakes, "j1");
        let params = ParamMap::new()
            .with(ParamKey::OrganizationId, "org1".to_string())
            .with(ParamKey::Region, "us-east-1".to_string())
            .with(ParamKey::DomainName, "my site.com".to_string());

        let params = RequestCertificate::new(&toolkit).run(params, &ctx).await.unwrap();
        assert!(params.get_opt::<String>(ParamKey::CertificateArn).unwrap().is_none());
        assert_eq!(fakes.cloud.count("find_certificate"), 0);
        assert_eq!(fakes.cloud.count("request_certificate"), 0);

        fakes.reports.shutdown().await;
        let notifications = fakes.plane.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].level, NotificationLevel::Warning);
        assert!(notifications[0].body.contains("\"my site\""));
        assert!(fakes.plane.certificate_updates().is_empty());
    }

    #[test]
    fn test_domain_problem() {
        assert_eq!(domain_problem("www.example.com"), None);
        assert_eq!(domain_problem("*.example.com"), None);
        assert_eq!(domain_problem("xn--bcher-kva.example"), None);
        assert!(domain_problem("").is_some());
        assert!(domain_problem("localhost").is_some());
        assert!(domain_problem("-bad.example.com").is_some());
        assert!(domain_problem("a..example.com").is_some());
        assert!(domain_problem(&format!("{}.com", "a".repeat(64))).is_some());
    }
}
