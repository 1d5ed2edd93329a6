// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cim-perf-cluster
//!
//! In-memory stand-ins for every external collaborator of the orchestrator:
//! the cloud stack, the load balancer, the remote shell, blob storage and
//! the single-machine installers.
//!
//! # Design Principles
//! - Machine addresses are fixed constants so bindings are reproducible
//! - The fake network enumerates machines in reverse address order
//! - Every remote action is recorded with the host it ran on
//! - Failures are injected per action, never by timing

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use cim_perf_cluster::domain::{ClusterRole, Investment, Machine, SshKey};
use cim_perf_cluster::logging::init_tracing;
use cim_perf_cluster::node::HostToolkit;
use cim_perf_cluster::provider::{
    ApplicationArchive, ArtifactFetcher, BlobTransport, DatabaseFormula, DiagnosticAgent,
    HomeSource, HostSetup, LoadBalancer, LoadBalancerFormula, NetworkProvisioner, OsMetrics,
    OsMetricsProbe, ProvisionedLoadBalancer, ProvisionedNetwork, RuntimeInstaller, StackSpec,
    StorageLocation,
};
use cim_perf_cluster::remote::{CommandOutput, RemoteAction, RemoteExecutor, RemoteSession};
use cim_perf_cluster::resource::{Resource, ResourceHandle};
use cim_perf_cluster::stage::StageFuture;
use cim_perf_cluster::{
    ClusterOrchestrator, ClusterShape, OrchestrationRequest, OrchestratorConfig, ProvisioningError,
    ProvisioningResult, RemoteTarget,
};

pub const DATABASE_PUBLIC: &str = "54.0.1.100";
pub const DATABASE_PRIVATE: &str = "10.0.1.100";
pub const SHARED_HOME_PUBLIC: &str = "54.0.1.101";
pub const SHARED_HOME_PRIVATE: &str = "10.0.1.101";
pub const LOAD_BALANCER_URI: &str = "http://perf-lb.example.com/";
pub const DATABASE_DATA: &str = "/home/ubuntu/database";
pub const JAVA_HOME: &str = "/usr/lib/jvm/java-11-openjdk-amd64";
pub const PRODUCT_DIR: &str = "atlassian-jira-software-9.4.0-standalone";

pub const DBCONFIG: &str = "<jira-database-config>\n  <jdbc-datasource>\n    <url>jdbc:mysql://dbhost:3306/jira?useUnicode=true</url>\n  </jdbc-datasource>\n</jira-database-config>\n";

/// Public address of application node `i` (zero-based)
pub fn node_public(i: usize) -> String {
    format!("54.0.0.{}", i + 1)
}

/// Private address of application node `i` (zero-based)
pub fn node_private(i: usize) -> String {
    format!("10.0.0.{}", i + 1)
}

pub fn machine(public: &str, private: &str, role: ClusterRole) -> Machine {
    Machine::new(public.parse().unwrap(), private.parse().unwrap()).with_tag(role.tag())
}

/// Machines of a stack with `nodes` application machines
pub fn stack_machines(nodes: usize, shared_home: bool) -> Vec<Machine> {
    let mut machines = vec![machine(DATABASE_PUBLIC, DATABASE_PRIVATE, ClusterRole::Database)];
    if shared_home {
        machines.push(machine(
            SHARED_HOME_PUBLIC,
            SHARED_HOME_PRIVATE,
            ClusterRole::SharedHome,
        ));
    }
    machines.extend(
        (0..nodes)
            .rev()
            .map(|i| machine(&node_public(i), &node_private(i), ClusterRole::ApplicationNode)),
    );
    machines
}

/// Ordered log of released resources, shared by every fake resource
pub type ReleaseLog = Arc<Mutex<Vec<String>>>;

pub struct Tracked {
    name: String,
    log: ReleaseLog,
}

#[async_trait]
impl Resource for Tracked {
    async fn release(&self) -> ProvisioningResult<()> {
        self.log.lock().push(self.name.clone());
        Ok(())
    }
}

pub fn tracked(name: &str, log: &ReleaseLog) -> ResourceHandle {
    ResourceHandle::new(
        name,
        Tracked {
            name: name.to_string(),
            log: log.clone(),
        },
    )
}

// ============================================================================
// Cloud
// ============================================================================

pub struct FakeStack {
    machines: Vec<Machine>,
    resource: ResourceHandle,
}

#[async_trait]
impl ProvisionedNetwork for FakeStack {
    async fn list_machines(&self) -> ProvisioningResult<Vec<Machine>> {
        Ok(self.machines.clone())
    }

    fn find_subnet(&self, name: &str) -> Option<String> {
        Some(format!("subnet-{}", name))
    }

    fn find_vpc(&self, name: &str) -> Option<String> {
        Some(format!("vpc-{}", name))
    }

    fn expiry(&self) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-19T13:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn resource(&self) -> ResourceHandle {
        self.resource.clone()
    }
}

pub struct FakeCloud {
    pub machines: Vec<Machine>,
    pub specs: Mutex<Vec<StackSpec>>,
    pub releases: ReleaseLog,
    pub fail: bool,
}

impl FakeCloud {
    pub fn new(machines: Vec<Machine>, releases: ReleaseLog) -> Self {
        Self {
            machines,
            specs: Mutex::new(Vec::new()),
            releases,
            fail: false,
        }
    }
}

#[async_trait]
impl NetworkProvisioner for FakeCloud {
    async fn availability_zones(&self) -> ProvisioningResult<Vec<String>> {
        Ok(["eu-central-1a", "eu-central-1b", "eu-central-1c"]
            .iter()
            .map(|z| z.to_string())
            .collect())
    }

    async fn default_image(&self) -> ProvisioningResult<String> {
        Ok("ami-0123456789".to_string())
    }

    async fn provision(&self, spec: StackSpec) -> ProvisioningResult<Arc<dyn ProvisionedNetwork>> {
        self.specs.lock().push(spec);
        if self.fail {
            return Err(ProvisioningError::Provisioning(
                "stack rolled back".to_string(),
            ));
        }
        Ok(Arc::new(FakeStack {
            machines: self.machines.clone(),
            resource: tracked("stack", &self.releases),
        }))
    }
}

/// How a [`FakeLoadBalancer`] answers the health wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Healthy,
    /// Never becomes healthy and never returns
    Hangs,
    /// Waits out the timeout it is given, then reports unhealthy targets
    GivesUp,
}

pub struct FakeLoadBalancer {
    uri: Url,
    health: Health,
}

#[async_trait]
impl LoadBalancer for FakeLoadBalancer {
    fn uri(&self) -> &Url {
        &self.uri
    }

    async fn wait_until_healthy(&self, timeout: Duration) -> ProvisioningResult<()> {
        match self.health {
            Health::Healthy => Ok(()),
            Health::Hangs => std::future::pending().await,
            Health::GivesUp => {
                tokio::time::sleep(timeout).await;
                Err(ProvisioningError::Provisioning(
                    "targets still unhealthy".to_string(),
                ))
            }
        }
    }
}

pub struct FakeLoadBalancerFormula {
    pub health: Health,
    pub releases: ReleaseLog,
    pub instances: Mutex<Vec<Machine>>,
}

impl FakeLoadBalancerFormula {
    pub fn new(health: Health, releases: ReleaseLog) -> Self {
        Self {
            health,
            releases,
            instances: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LoadBalancerFormula for FakeLoadBalancerFormula {
    async fn provision(
        &self,
        _investment: &Investment,
        instances: &[Machine],
        _network: Arc<dyn ProvisionedNetwork>,
        _key: &SshKey,
    ) -> ProvisioningResult<ProvisionedLoadBalancer> {
        self.instances.lock().extend_from_slice(instances);
        Ok(ProvisionedLoadBalancer {
            load_balancer: Arc::new(FakeLoadBalancer {
                uri: Url::parse(LOAD_BALANCER_URI).unwrap(),
                health: self.health,
            }),
            resource: tracked("load balancer", &self.releases),
        })
    }
}

#[derive(Default)]
pub struct FakeDatabase {
    pub started_for: Mutex<Vec<Url>>,
}

#[async_trait]
impl DatabaseFormula for FakeDatabase {
    async fn setup(&self, _session: &dyn RemoteSession) -> ProvisioningResult<String> {
        Ok(DATABASE_DATA.to_string())
    }

    async fn start(&self, application: &Url, _session: &dyn RemoteSession) -> ProvisioningResult<()> {
        self.started_for.lock().push(application.clone());
        Ok(())
    }
}

// ============================================================================
// Remote shell
// ============================================================================

/// Which actions a [`FakeShell`] answers with a non-zero exit
pub type FailWhen = Arc<dyn Fn(&RemoteAction) -> bool + Send + Sync>;

/// Records every action and answers reads with canned content
#[derive(Clone, Default)]
pub struct FakeShell {
    pub log: Arc<Mutex<Vec<(String, RemoteAction)>>>,
    pub fail_when: Option<FailWhen>,
}

impl FakeShell {
    pub fn failing(fail_when: impl Fn(&RemoteAction) -> bool + Send + Sync + 'static) -> Self {
        Self {
            log: Arc::default(),
            fail_when: Some(Arc::new(fail_when)),
        }
    }

    /// Actions run on `host`, in order
    pub fn actions_on(&self, host: &str) -> Vec<RemoteAction> {
        self.log
            .lock()
            .iter()
            .filter(|(h, _)| h == host)
            .map(|(_, action)| action.clone())
            .collect()
    }

    pub fn all_actions(&self) -> Vec<RemoteAction> {
        self.log.lock().iter().map(|(_, a)| a.clone()).collect()
    }
}

struct FakeSession {
    target: RemoteTarget,
    shell: FakeShell,
}

fn canned_read(path: &str) -> String {
    if path.ends_with("dbconfig.xml") {
        DBCONFIG.to_string()
    } else if path.ends_with("setenv.sh") {
        "JVM_MINIMUM_MEMORY=\nJVM_MAXIMUM_MEMORY=\n".to_string()
    } else {
        "<Plugin java>\n  ServiceURL \"service:jmx:rmi:///jndi/rmi://localhost:3333/jmxrmi\"\n</Plugin>\n"
            .to_string()
    }
}

#[async_trait]
impl RemoteSession for FakeSession {
    fn target(&self) -> &RemoteTarget {
        &self.target
    }

    async fn execute(&self, action: &RemoteAction, _timeout: Duration) -> ProvisioningResult<CommandOutput> {
        self.shell
            .log
            .lock()
            .push((self.target.address().to_string(), action.clone()));
        if let Some(fail_when) = &self.shell.fail_when {
            if fail_when(action) {
                return Ok(CommandOutput::failure(1, "injected failure"));
            }
        }
        let stdout = match action {
            RemoteAction::ListArchive { .. } => {
                format!("{0}/\n{0}/README.txt\n", PRODUCT_DIR)
            }
            RemoteAction::ReadFile { path } => canned_read(path),
            RemoteAction::ResolvePath { path } => format!("/home/ubuntu/{}\n", path),
            _ => String::new(),
        };
        Ok(CommandOutput::success(stdout))
    }

    async fn close(&self) -> ProvisioningResult<()> {
        Ok(())
    }
}

#[async_trait]
impl RemoteExecutor for FakeShell {
    async fn connect(&self, target: &RemoteTarget) -> ProvisioningResult<Box<dyn RemoteSession>> {
        Ok(Box::new(FakeSession {
            target: target.clone(),
            shell: self.clone(),
        }))
    }
}

// ============================================================================
// Storage and host installers
// ============================================================================

pub struct FakeTransport {
    location: StorageLocation,
    pub uploads: Mutex<Vec<PathBuf>>,
}

impl FakeTransport {
    pub fn new(uri: &str) -> Self {
        Self {
            location: StorageLocation::new(uri, "eu-central-1"),
            uploads: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl BlobTransport for FakeTransport {
    fn location(&self) -> &StorageLocation {
        &self.location
    }

    async fn upload(&self, source: &Path) -> ProvisioningResult<()> {
        self.uploads.lock().push(source.to_path_buf());
        Ok(())
    }

    async fn download(&self, target: &Path) -> ProvisioningResult<PathBuf> {
        Ok(target.join("results"))
    }
}

/// Fetches anything whose URI does not contain "broken"
pub struct FakeFetcher;

#[async_trait]
impl ArtifactFetcher for FakeFetcher {
    async fn fetch(&self, uri: &str, destination: &Path) -> ProvisioningResult<()> {
        if uri.contains("broken") {
            return Err(ProvisioningError::Provisioning(format!("404 Not Found: {}", uri)));
        }
        tokio::fs::write(destination, uri).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeHost {
    pub archive_fails: AtomicBool,
    pub forwarded: Mutex<Vec<String>>,
}

#[async_trait]
impl HostSetup for FakeHost {
    fn instance_type(&self) -> &str {
        "c5.2xlarge"
    }

    async fn setup(&self, _session: &dyn RemoteSession) -> ProvisioningResult<()> {
        Ok(())
    }
}

#[async_trait]
impl ApplicationArchive for FakeHost {
    async fn download(&self, session: &dyn RemoteSession, directory: &str) -> ProvisioningResult<String> {
        if self.archive_fails.load(Ordering::SeqCst) {
            return Err(ProvisioningError::Provisioning(format!(
                "archive download to {} failed",
                session.target()
            )));
        }
        Ok(format!("{}/jira.tar.gz", directory))
    }
}

#[async_trait]
impl HomeSource for FakeHost {
    async fn download(&self, _session: &dyn RemoteSession) -> ProvisioningResult<String> {
        Ok("jira-home".to_string())
    }
}

#[async_trait]
impl RuntimeInstaller for FakeHost {
    async fn install(&self, _session: &dyn RemoteSession) -> ProvisioningResult<()> {
        Ok(())
    }

    fn home(&self) -> &str {
        JAVA_HOME
    }
}

#[async_trait]
impl OsMetricsProbe for FakeHost {
    async fn capture(&self, _session: &dyn RemoteSession) -> ProvisioningResult<OsMetrics> {
        let mut metrics = OsMetrics::default();
        metrics.values.insert("cpus".to_string(), "8".to_string());
        Ok(metrics)
    }
}

#[async_trait]
impl DiagnosticAgent for FakeHost {
    async fn install(
        &self,
        _session: &dyn RemoteSession,
        node_name: &str,
        _log_dir: &str,
    ) -> ProvisioningResult<()> {
        self.forwarded.lock().push(node_name.to_string());
        Ok(())
    }
}

pub fn toolkit(shell: &FakeShell, host: &Arc<FakeHost>) -> HostToolkit {
    HostToolkit {
        executor: Arc::new(shell.clone()),
        host: host.clone(),
        archive: host.clone(),
        home: host.clone(),
        runtime: host.clone(),
        metrics: host.clone(),
        log_forwarder: host.clone(),
    }
}

// ============================================================================
// Orchestration harness
// ============================================================================

/// Everything a test may want to inspect after a run
pub struct Harness {
    pub shell: FakeShell,
    pub host: Arc<FakeHost>,
    pub cloud: Arc<FakeCloud>,
    pub load_balancer: Arc<FakeLoadBalancerFormula>,
    pub database: Arc<FakeDatabase>,
    pub plugins: Arc<FakeTransport>,
    pub results: Arc<FakeTransport>,
    pub releases: ReleaseLog,
}

impl Harness {
    /// A data-center harness whose stack holds `nodes` application machines
    pub fn data_center(nodes: usize) -> Self {
        Self::with(stack_machines(nodes, true), FakeShell::default(), Health::Healthy)
    }

    pub fn standalone() -> Self {
        Self::with(stack_machines(1, false), FakeShell::default(), Health::Healthy)
    }

    pub fn with(machines: Vec<Machine>, shell: FakeShell, health: Health) -> Self {
        init_tracing(tracing::Level::DEBUG);
        let releases = ReleaseLog::default();
        Self {
            shell,
            host: Arc::new(FakeHost::default()),
            cloud: Arc::new(FakeCloud::new(machines, releases.clone())),
            load_balancer: Arc::new(FakeLoadBalancerFormula::new(health, releases.clone())),
            database: Arc::new(FakeDatabase::default()),
            plugins: Arc::new(FakeTransport::new("s3://perf-plugins/run-1")),
            results: Arc::new(FakeTransport::new("s3://perf-results/run-1")),
            releases,
        }
    }

    pub fn data_center_orchestrator(&self) -> ClusterOrchestrator {
        self.orchestrator(ClusterShape::DataCenter {
            load_balancer: self.load_balancer.clone(),
        })
    }

    pub fn standalone_orchestrator(&self) -> ClusterOrchestrator {
        self.orchestrator(ClusterShape::Standalone)
    }

    fn orchestrator(&self, shape: ClusterShape) -> ClusterOrchestrator {
        ClusterOrchestrator::builder(
            shape,
            self.cloud.clone(),
            self.database.clone(),
            toolkit(&self.shell, &self.host),
            Arc::new(FakeFetcher),
        )
        .config(OrchestratorConfig::default())
        .build()
    }

    pub fn request(&self, configs: Vec<cim_perf_cluster::NodeConfig>) -> OrchestrationRequest {
        OrchestrationRequest {
            configs,
            investment: Investment::new("perf test", Duration::from_secs(3600)),
            plugins_transport: self.plugins.clone(),
            results_transport: self.results.clone(),
            key: StageFuture::ready("credentials", SshKey::new("perf-key", "/keys/perf.pem")),
            role_profile: "perf-instance-profile".to_string(),
        }
    }
}
