//! Networking and compute infrastructure

use async_trait::async_trait;
use drover_core::domain::command::CommandKind;
use drover_core::domain::params::{ParamKey, ParamMap};
use drover_core::domain::status::{ClusterUpsert, VpcUpsert};
use std::sync::Arc;

use super::{Command, CommandError, Toolkit, resource_name};
use crate::context::Context;
use crate::effectors::CloudProvider;
use crate::reporting::ReportPipelines;

const DEFAULT_VPC_CIDR: &str = "10.0.0.0/16";

/// Makes sure the organization has a VPC in the region
pub struct EnsureVpc {
    cloud: Arc<dyn CloudProvider>,
    reports: Arc<ReportPipelines>,
}

impl EnsureVpc {
    pub fn new(toolkit: &Toolkit) -> Self {
        Self {
            cloud: Arc::clone(&toolkit.cloud),
            reports: Arc::clone(&toolkit.reports),
        }
    }
}

#[async_trait]
impl Command for EnsureVpc {
    fn kind(&self) -> CommandKind {
        CommandKind::EnsureVpc
    }

    async fn run(&self, mut params: ParamMap, ctx: &Context) -> Result<ParamMap, CommandError> {
        let organization_id: String = params.get(ParamKey::OrganizationId)?;
        let region: String = params.get(ParamKey::Region)?;
        let cidr: String = params
            .get_opt(ParamKey::VpcCidr)?
            .unwrap_or_else(|| DEFAULT_VPC_CIDR.to_string());
        let name = resource_name(&["drover", &organization_id]);

        let vpc = match self.cloud.find_vpc(&region, &name).await? {
            Some(vpc) => {
                ctx.log_info(format!("Using existing VPC {}", vpc.id));
                vpc
            }
            None => {
                ctx.log_info(format!("Creating VPC {} ({})", name, cidr));
                self.cloud.create_vpc(&region, &name, &cidr).await?
            }
        };

        self.reports.vpcs.push(VpcUpsert {
            organization_id,
            vpc_id: vpc.id.clone(),
            region,
            cidr: vpc.cidr,
            subnets: vpc.subnets.clone(),
            route_tables: vpc.route_tables.clone(),
        });

        params.set(ParamKey::VpcId, vpc.id);
        params.set(ParamKey::SubnetMap, vpc.subnets);
        params.set(ParamKey::RouteTableMap, vpc.route_tables);
        Ok(params)
    }
}

/// Describe-or-create of a container cluster
pub struct CreateCluster {
    cloud: Arc<dyn CloudProvider>,
    reports: Arc<ReportPipelines>,
}

impl CreateCluster {
    pub fn new(toolkit: &Toolkit) -> Self {
        Self {
            cloud: Arc::clone(&toolkit.cloud),
            reports: Arc::clone(&toolkit.reports),
        }
    }
}

#[async_trait]
impl Command for CreateCluster {
    fn kind(&self) -> CommandKind {
        CommandKind::CreateCluster
    }

    async fn run(&self, mut params: ParamMap, ctx: &Context) -> Result<ParamMap, CommandError> {
        let organization_id: String = params.get(ParamKey::OrganizationId)?;
        let region: String = params.get(ParamKey::Region)?;
        let cluster_name: String = params.get(ParamKey::ClusterName)?;
        let vpc_id: Option<String> = params.get_opt(ParamKey::VpcId)?;

        let cluster = match self.cloud.find_cluster(&region, &cluster_name).await? {
            Some(cluster) => {
                ctx.log_info(format!("Cluster {} already exists", cluster.name));
                cluster
            }
            None => {
                ctx.log_info(format!("Creating cluster {}", cluster_name));
                self.cloud
                    .create_cluster(&region, &cluster_name, vpc_id.as_deref())
                    .await?
            }
        };

        self.reports.clusters.push(ClusterUpsert {
            organization_id,
            cluster_arn: cluster.arn.clone(),
            name: cluster.name,
            region: cluster.region,
            vpc_id: cluster.vpc_id,
        });

        params.set(ParamKey::EcsClusterArn, cluster.arn);
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{job_context, toolkit};
    use drover_core::domain::payload::SubnetMap;

    #[tokio::test]
    async fn test_create_cluster_twice_yields_one_cluster() {
        let (toolkit, fakes) = toolkit();
        let (ctx, _root) = job_context(&fakes, "j1");
        let params = ParamMap::new()
            .with(ParamKey::OrganizationId, "org1".to_string())
            .with(ParamKey::Region, "eu-west-1".to_string())
            .with(ParamKey::ClusterName, "apps".to_string());

        let command = CreateCluster::new(&toolkit);
        let first = command.run(params.clone(), &ctx).await.unwrap();
        let second = command.run(params, &ctx).await.unwrap();

        let arn: String = first.get(ParamKey::EcsClusterArn).unwrap();
        assert_eq!(arn, second.get::<String>(ParamKey::EcsClusterArn).unwrap());
        assert_eq!(fakes.cloud.count("create_cluster"), 1);

        fakes.reports.shutdown().await;
        assert_eq!(fakes.plane.cluster_upserts().len(), 2);
    }

    #[tokio::test]
    async fn test_ensure_vpc_writes_network_params() {
        let (toolkit, fakes) = toolkit();
        let (ctx, _root) = job_context(&fakes, "j1");
        let params = ParamMap::new()
            .with(ParamKey::OrganizationId, "org1".to_string())
            .with(ParamKey::Region, "eu-west-1".to_string());

        let params = EnsureVpc::new(&toolkit).run(params, &ctx).await.unwrap();

        let vpc_id: String = params.get(ParamKey::VpcId).unwrap();
        let subnets: SubnetMap = params.get(ParamKey::SubnetMap).unwrap();
        assert!(vpc_id.starts_with("vpc-"));
        assert!(!subnets.0.is_empty());

        fakes.reports.shutdown().await;
        let upserts = fakes.plane.vpc_upserts();
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0].cidr, DEFAULT_VPC_CIDR);
    }
}
