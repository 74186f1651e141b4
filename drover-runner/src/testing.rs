//! In-memory doubles for the control plane and the effectors

use async_trait::async_trait;
use drover_client::{ClientError, ControlPlane, Result};
use drover_core::domain::job::{CompletionRecord, PendingJob};
use drover_core::domain::log::JobLogLine;
use drover_core::domain::payload::{DeploymentData, RouteTableMap, SubnetMap};
use drover_core::domain::runner::RunnerIdentity;
use drover_core::domain::status::{
    AgentResponse, AutomationResponse, BuildStatus, CertificateState, CertificateUpdate,
    ClusterUpsert, DeploymentStatus, JobOutput, Notification, PreviewStatus, VpcUpsert,
};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use crate::commands::Toolkit;
use crate::context::{Context, Workspace};
use crate::effectors::cloud::{Bucket, Certificate, Cluster, Distribution, Repository, Vpc};
use crate::effectors::{
    BuildError, BuildTool, CheckoutOutcome, CheckoutRequest, CloudError, CloudProvider,
    ContainerTool, GitError, SourceControl,
};
use crate::reporting::ReportPipelines;

// =============================================================================
// Control plane
// =============================================================================

#[derive(Default)]
struct Recorded {
    pending: VecDeque<Vec<PendingJob>>,
    completions: Vec<CompletionRecord>,
    log_lines: Vec<JobLogLine>,
    builds: Vec<BuildStatus>,
    build_batch_organizations: Vec<String>,
    previews: Vec<PreviewStatus>,
    deployments: Vec<DeploymentStatus>,
    certificates: Vec<CertificateUpdate>,
    vpcs: Vec<VpcUpsert>,
    clusters: Vec<ClusterUpsert>,
    notifications: Vec<Notification>,
    job_outputs: Vec<JobOutput>,
    agent_responses: Vec<AgentResponse>,
    automation_responses: Vec<AutomationResponse>,
    refresh_calls: Vec<i64>,
    heartbeats: Vec<String>,
    deployment: Option<DeploymentData>,
}

/// Records every call; fails all of them with `NotConnected` while disconnected
pub struct FakeControlPlane {
    connected: AtomicBool,
    stopping: AtomicBool,
    polls: AtomicUsize,
    recorded: Mutex<Recorded>,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            stopping: AtomicBool::new(false),
            polls: AtomicUsize::new(0),
            recorded: Mutex::new(Recorded::default()),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// What heartbeats answer from now on
    pub fn set_stopping(&self, stopping: bool) {
        self.stopping.store(stopping, Ordering::SeqCst);
    }

    /// Queues the answer of one future poll
    pub fn push_jobs(&self, jobs: Vec<PendingJob>) {
        self.recorded.lock().unwrap().pending.push_back(jobs);
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn set_deployment(&self, deployment: DeploymentData) {
        self.recorded.lock().unwrap().deployment = Some(deployment);
    }

    pub fn completions(&self) -> Vec<CompletionRecord> {
        self.recorded.lock().unwrap().completions.clone()
    }

    pub fn log_lines(&self) -> Vec<JobLogLine> {
        self.recorded.lock().unwrap().log_lines.clone()
    }

    pub fn log_messages(&self, job_id: &str) -> Vec<String> {
        self.log_lines()
            .into_iter()
            .filter(|line| line.job_id == job_id)
            .map(|line| line.message)
            .collect()
    }

    pub fn build_statuses(&self) -> Vec<BuildStatus> {
        self.recorded.lock().unwrap().builds.clone()
    }

    pub fn build_batch_organizations(&self) -> Vec<String> {
        self.recorded.lock().unwrap().build_batch_organizations.clone()
    }

    pub fn preview_statuses(&self) -> Vec<PreviewStatus> {
        self.recorded.lock().unwrap().previews.clone()
    }

    pub fn deployment_statuses(&self) -> Vec<DeploymentStatus> {
        self.recorded.lock().unwrap().deployments.clone()
    }

    pub fn certificate_updates(&self) -> Vec<CertificateUpdate> {
        self.recorded.lock().unwrap().certificates.clone()
    }

    pub fn vpc_upserts(&self) -> Vec<VpcUpsert> {
        self.recorded.lock().unwrap().vpcs.clone()
    }

    pub fn cluster_upserts(&self) -> Vec<ClusterUpsert> {
        self.recorded.lock().unwrap().clusters.clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.recorded.lock().unwrap().notifications.clone()
    }

    pub fn job_outputs(&self) -> Vec<JobOutput> {
        self.recorded.lock().unwrap().job_outputs.clone()
    }

    pub fn agent_responses(&self) -> Vec<AgentResponse> {
        self.recorded.lock().unwrap().agent_responses.clone()
    }

    pub fn automation_responses(&self) -> Vec<AutomationResponse> {
        self.recorded.lock().unwrap().automation_responses.clone()
    }

    pub fn refresh_calls(&self) -> Vec<i64> {
        self.recorded.lock().unwrap().refresh_calls.clone()
    }

    pub fn heartbeats(&self) -> Vec<String> {
        self.recorded.lock().unwrap().heartbeats.clone()
    }

    fn record(&self, apply: impl FnOnce(&mut Recorded)) -> Result<()> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        apply(&mut *self.recorded.lock().unwrap());
        Ok(())
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn poll_pending(&self, _identity: &RunnerIdentity) -> Result<Vec<PendingJob>> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .recorded
            .lock()
            .unwrap()
            .pending
            .pop_front()
            .unwrap_or_default())
    }

    async fn mark_jobs_complete(&self, records: Vec<CompletionRecord>) -> Result<()> {
        self.record(|r| r.completions.extend(records))
    }

    async fn heartbeat(&self, job_id: &str) -> Result<bool> {
        self.record(|r| r.heartbeats.push(job_id.to_string()))?;
        Ok(self.stopping.load(Ordering::SeqCst))
    }

    async fn send_job_logs(&self, lines: Vec<JobLogLine>) -> Result<()> {
        self.record(|r| r.log_lines.extend(lines))
    }

    async fn update_builds(&self, organization_id: &str, batch: Vec<BuildStatus>) -> Result<()> {
        self.record(|r| {
            r.build_batch_organizations.push(organization_id.to_string());
            r.builds.extend(batch);
        })
    }

    async fn update_previews(&self, _organization_id: &str, batch: Vec<PreviewStatus>) -> Result<()> {
        self.record(|r| r.previews.extend(batch))
    }

    async fn update_deployments(
        &self,
        _organization_id: &str,
        batch: Vec<DeploymentStatus>,
    ) -> Result<()> {
        self.record(|r| r.deployments.extend(batch))
    }

    async fn get_deployment(
        &self,
        _organization_id: &str,
        deployment_id: &str,
    ) -> Result<Option<DeploymentData>> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        Ok(self
            .recorded
            .lock()
            .unwrap()
            .deployment
            .clone()
            .filter(|deployment| deployment.deployment_id == deployment_id))
    }

    async fn update_certificates(
        &self,
        _organization_id: &str,
        batch: Vec<CertificateUpdate>,
    ) -> Result<()> {
        self.record(|r| r.certificates.extend(batch))
    }

    async fn upsert_vpcs(&self, batch: Vec<VpcUpsert>) -> Result<()> {
        self.record(|r| r.vpcs.extend(batch))
    }

    async fn upsert_clusters(&self, batch: Vec<ClusterUpsert>) -> Result<()> {
        self.record(|r| r.clusters.extend(batch))
    }

    async fn send_notifications(&self, _organization_id: &str, batch: Vec<Notification>) -> Result<()> {
        self.record(|r| r.notifications.extend(batch))
    }

    async fn update_job_outputs(&self, _organization_id: &str, batch: Vec<JobOutput>) -> Result<()> {
        self.record(|r| r.job_outputs.extend(batch))
    }

    async fn update_agent_responses(
        &self,
        _organization_id: &str,
        batch: Vec<AgentResponse>,
    ) -> Result<()> {
        self.record(|r| r.agent_responses.extend(batch))
    }

    async fn update_automation_responses(
        &self,
        _organization_id: &str,
        batch: Vec<AutomationResponse>,
    ) -> Result<()> {
        self.record(|r| r.automation_responses.extend(batch))
    }

    async fn refresh_git_token(&self, installation_id: i64, _organization_id: &str) -> Result<String> {
        self.record(|r| r.refresh_calls.push(installation_id))?;
        Ok("refreshed-token".to_string())
    }
}

// =============================================================================
// Source control
// =============================================================================

pub struct FakeSourceControl {
    auth_failures: AtomicUsize,
    tokens: Mutex<Vec<Option<String>>>,
}

impl FakeSourceControl {
    fn new() -> Self {
        Self {
            auth_failures: AtomicUsize::new(0),
            tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn commit_hash(&self) -> String {
        "4f2a9c1e8b7d6a5f4e3d2c1b0a9f8e7d6c5b4a39".to_string()
    }

    /// The next `times` checkouts fail with an authentication error
    pub fn fail_auth_times(&self, times: usize) {
        self.auth_failures.store(times, Ordering::SeqCst);
    }

    pub fn tokens_seen(&self) -> Vec<Option<String>> {
        self.tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceControl for FakeSourceControl {
    async fn checkout(&self, request: &CheckoutRequest) -> std::result::Result<CheckoutOutcome, GitError> {
        self.tokens.lock().unwrap().push(request.token.clone());

        let remaining = self.auth_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.auth_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(GitError::AuthRequired);
        }

        std::fs::create_dir_all(&request.dest)?;
        std::fs::write(request.dest.join("index.html"), "<h1>hello</h1>")?;
        Ok(CheckoutOutcome {
            path: request.dest.clone(),
            commit_hash: self.commit_hash(),
        })
    }
}

// =============================================================================
// Builds
// =============================================================================

pub struct FakeBuildTool {
    commands: Mutex<Vec<String>>,
    output_dir: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
}

impl FakeBuildTool {
    fn new() -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            output_dir: Mutex::new(Some("dist".to_string())),
            delay: Mutex::new(None),
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Directory the build creates under its working directory
    pub fn set_output_dir(&self, dir: Option<&str>) {
        *self.output_dir.lock().unwrap() = dir.map(str::to_string);
    }

    /// Every build takes at least `delay`
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl BuildTool for FakeBuildTool {
    async fn run(&self, dir: &Path, command: &str, ctx: &Context) -> std::result::Result<(), BuildError> {
        self.commands.lock().unwrap().push(command.to_string());
        ctx.log_info(format!("$ {}", command));

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let output_dir = self.output_dir.lock().unwrap().clone();
        if let Some(output_dir) = output_dir {
            let output = dir.join(output_dir);
            std::fs::create_dir_all(&output)?;
            std::fs::write(output.join("index.html"), "<h1>built</h1>")?;
        }
        Ok(())
    }
}

pub struct FakeContainerTool {
    builds: Mutex<Vec<String>>,
}

impl FakeContainerTool {
    fn new() -> Self {
        Self {
            builds: Mutex::new(Vec::new()),
        }
    }

    pub fn builds(&self) -> Vec<String> {
        self.builds.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerTool for FakeContainerTool {
    async fn image_exists(&self, image: &str) -> std::result::Result<bool, BuildError> {
        Ok(self.builds.lock().unwrap().iter().any(|built| built == image))
    }

    async fn build(
        &self,
        _context_dir: &Path,
        _dockerfile: &Path,
        image: &str,
        _ctx: &Context,
    ) -> std::result::Result<(), BuildError> {
        self.builds.lock().unwrap().push(image.to_string());
        Ok(())
    }
}

// =============================================================================
// Cloud
// =============================================================================

#[derive(Default)]
struct CloudState {
    calls: Vec<String>,
    fail_methods: HashMap<String, String>,
    fail_calls: HashMap<usize, String>,
    buckets: BTreeMap<String, Bucket>,
    uploads: HashMap<String, usize>,
    distributions: BTreeMap<String, Distribution>,
    vpcs: Vec<Vpc>,
    clusters: Vec<Cluster>,
    repositories: Vec<Repository>,
    images: HashMap<(String, String), String>,
    certificates: Vec<Certificate>,
}

/// Find-or-create semantics over in-memory maps, with injectable failures
pub struct FakeCloud {
    state: Mutex<CloudState>,
    ids: AtomicU64,
}

impl FakeCloud {
    fn new() -> Self {
        Self {
            state: Mutex::new(CloudState::default()),
            ids: AtomicU64::new(1),
        }
    }

    /// How many times `method` was called
    pub fn count(&self, method: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.as_str() == method)
            .count()
    }

    /// Every call of `method` fails with `message`
    pub fn fail_on(&self, method: &str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_methods
            .insert(method.to_string(), message.to_string());
    }

    /// The `n`th call overall (1-based) fails with `message`
    pub fn fail_on_call(&self, n: usize, message: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_calls
            .insert(n, message.to_string());
    }

    pub fn seed_bucket(&self, name: &str) {
        self.state.lock().unwrap().buckets.insert(
            name.to_string(),
            Bucket {
                name: name.to_string(),
                region: "eu-west-1".to_string(),
                location: format!("memory://{}", name),
            },
        );
    }

    pub fn has_bucket(&self, name: &str) -> bool {
        self.state.lock().unwrap().buckets.contains_key(name)
    }

    fn next_id(&self) -> u64 {
        self.ids.fetch_add(1, Ordering::SeqCst)
    }

    /// Records the call, then applies any injected failure
    fn enter(&self, method: &str) -> std::result::Result<std::sync::MutexGuard<'_, CloudState>, CloudError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(method.to_string());
        let n = state.calls.len();
        if let Some(message) = state.fail_calls.get(&n).cloned() {
            return Err(CloudError::Api(message));
        }
        if let Some(message) = state.fail_methods.get(method).cloned() {
            return Err(CloudError::Api(message));
        }
        Ok(state)
    }
}

type CloudResult<T> = std::result::Result<T, CloudError>;

#[async_trait]
impl CloudProvider for FakeCloud {
    async fn find_bucket(&self, _region: &str, name: &str) -> CloudResult<Option<Bucket>> {
        Ok(self.enter("find_bucket")?.buckets.get(name).cloned())
    }

    async fn create_bucket(&self, region: &str, name: &str) -> CloudResult<Bucket> {
        let mut state = self.enter("create_bucket")?;
        let bucket = Bucket {
            name: name.to_string(),
            region: region.to_string(),
            location: format!("memory://{}", name),
        };
        state.buckets.insert(name.to_string(), bucket.clone());
        Ok(bucket)
    }

    async fn upload_directory(&self, bucket: &str, source: &Path) -> CloudResult<usize> {
        let mut state = self.enter("upload_directory")?;
        if !state.buckets.contains_key(bucket) {
            return Err(CloudError::NotFound {
                kind: "bucket",
                id: bucket.to_string(),
            });
        }
        let files = std::fs::read_dir(source)?.count();
        state.uploads.insert(bucket.to_string(), files);
        Ok(files)
    }

    async fn delete_bucket(&self, name: &str) -> CloudResult<()> {
        let mut state = self.enter("delete_bucket")?;
        state.buckets.remove(name);
        state.uploads.remove(name);
        Ok(())
    }

    async fn find_distribution(&self, bucket: &str) -> CloudResult<Option<Distribution>> {
        let state = self.enter("find_distribution")?;
        Ok(state
            .distributions
            .values()
            .find(|distribution| distribution.bucket == bucket)
            .cloned())
    }

    async fn create_distribution(&self, bucket: &str, alias: Option<&str>) -> CloudResult<Distribution> {
        let id = format!("E{:06}", self.next_id());
        let mut state = self.enter("create_distribution")?;
        let distribution = Distribution {
            domain: format!("{}.cdn.test", id.to_ascii_lowercase()),
            id: id.clone(),
            bucket: bucket.to_string(),
            alias: alias.map(str::to_string),
        };
        state.distributions.insert(id, distribution.clone());
        Ok(distribution)
    }

    async fn delete_distribution(&self, id: &str) -> CloudResult<()> {
        self.enter("delete_distribution")?.distributions.remove(id);
        Ok(())
    }

    async fn find_vpc(&self, region: &str, name: &str) -> CloudResult<Option<Vpc>> {
        let state = self.enter("find_vpc")?;
        Ok(state
            .vpcs
            .iter()
            .find(|vpc| vpc.region == region && vpc.name == name)
            .cloned())
    }

    async fn create_vpc(&self, region: &str, name: &str, cidr: &str) -> CloudResult<Vpc> {
        let n = self.next_id();
        let mut state = self.enter("create_vpc")?;
        let subnet = format!("subnet-{:04}", n);
        let vpc = Vpc {
            id: format!("vpc-{:04}", n),
            name: name.to_string(),
            region: region.to_string(),
            cidr: cidr.to_string(),
            subnets: SubnetMap(BTreeMap::from([(
                format!("{}a", region),
                subnet.clone(),
            )])),
            route_tables: RouteTableMap(BTreeMap::from([(subnet, format!("rtb-{:04}", n))])),
        };
        state.vpcs.push(vpc.clone());
        Ok(vpc)
    }

    async fn find_cluster(&self, region: &str, name: &str) -> CloudResult<Option<Cluster>> {
        let state = self.enter("find_cluster")?;
        Ok(state
            .clusters
            .iter()
            .find(|cluster| cluster.region == region && cluster.name == name)
            .cloned())
    }

    async fn create_cluster(&self, region: &str, name: &str, vpc_id: Option<&str>) -> CloudResult<Cluster> {
        let mut state = self.enter("create_cluster")?;
        let cluster = Cluster {
            arn: format!("arn:local:cluster/{}/{}", region, name),
            name: name.to_string(),
            region: region.to_string(),
            vpc_id: vpc_id.map(str::to_string),
        };
        state.clusters.push(cluster.clone());
        Ok(cluster)
    }

    async fn find_repository(&self, region: &str, name: &str) -> CloudResult<Option<Repository>> {
        let state = self.enter("find_repository")?;
        Ok(state
            .repositories
            .iter()
            .find(|repository| repository.region == region && repository.name == name)
            .cloned())
    }

    async fn create_repository(&self, region: &str, name: &str) -> CloudResult<Repository> {
        let mut state = self.enter("create_repository")?;
        let repository = Repository {
            name: name.to_string(),
            region: region.to_string(),
            uri: format!("registry.{}.test/{}", region, name),
        };
        state.repositories.push(repository.clone());
        Ok(repository)
    }

    async fn find_image(&self, repository_uri: &str, tag: &str) -> CloudResult<Option<String>> {
        let state = self.enter("find_image")?;
        Ok(state
            .images
            .get(&(repository_uri.to_string(), tag.to_string()))
            .cloned())
    }

    async fn push_image(&self, local_image: &str, repository_uri: &str, tag: &str) -> CloudResult<String> {
        let mut state = self.enter("push_image")?;
        let digest = format!("sha256:{}", local_image.len() + tag.len());
        state
            .images
            .insert((repository_uri.to_string(), tag.to_string()), digest.clone());
        Ok(digest)
    }

    async fn find_certificate(&self, region: &str, domain: &str) -> CloudResult<Option<Certificate>> {
        let state = self.enter("find_certificate")?;
        Ok(state
            .certificates
            .iter()
            .find(|certificate| certificate.region == region && certificate.domain == domain)
            .cloned())
    }

    async fn request_certificate(&self, region: &str, domain: &str) -> CloudResult<Certificate> {
        let n = self.next_id();
        let mut state = self.enter("request_certificate")?;
        let certificate = Certificate {
            arn: format!("arn:local:certificate/{}", n),
            domain: domain.to_string(),
            region: region.to_string(),
            status: CertificateState::PendingValidation,
            cname_name: Some(format!("_validate.{}", domain)),
            cname_value: Some(format!("_{}.validations.test", n)),
        };
        state.certificates.push(certificate.clone());
        Ok(certificate)
    }
}

// =============================================================================
// Wiring
// =============================================================================

/// Handles on every double behind a [`Toolkit`]
pub struct Fakes {
    pub plane: Arc<FakeControlPlane>,
    pub source: Arc<FakeSourceControl>,
    pub builder: Arc<FakeBuildTool>,
    pub containers: Arc<FakeContainerTool>,
    pub cloud: Arc<FakeCloud>,
    pub reports: Arc<ReportPipelines>,
}

/// Must be called inside a runtime; starts the report pipelines
pub fn toolkit() -> (Toolkit, Fakes) {
    let plane = Arc::new(FakeControlPlane::new());
    let fakes = Fakes {
        reports: Arc::new(ReportPipelines::start(plane.clone())),
        plane,
        source: Arc::new(FakeSourceControl::new()),
        builder: Arc::new(FakeBuildTool::new()),
        containers: Arc::new(FakeContainerTool::new()),
        cloud: Arc::new(FakeCloud::new()),
    };

    let toolkit = Toolkit {
        plane: fakes.plane.clone(),
        reports: Arc::clone(&fakes.reports),
        source: fakes.source.clone(),
        builder: fakes.builder.clone(),
        containers: fakes.containers.clone(),
        cloud: fakes.cloud.clone(),
    };
    (toolkit, fakes)
}

/// A context for `job_id` whose workspace lives in a fresh temporary root
pub fn job_context(fakes: &Fakes, job_id: &str) -> (Context, TempDir) {
    let root = tempfile::tempdir().unwrap();
    let workspace = Workspace::create(root.path(), "org1", job_id).unwrap();
    let ctx = Context::new(job_id, Arc::clone(&fakes.reports), workspace);
    (ctx, root)
}
