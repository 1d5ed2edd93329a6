// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cluster Orchestration
//!
//! [`ClusterOrchestrator::orchestrate`] drives one provisioning run. Every
//! stage of the [`StagePlan`] is submitted up front to a pool scoped to the
//! run; stages start as soon as their declared inputs settle. The driver
//! then awaits the outcomes in phase order and records each phase on the
//! [`OrchestrationState`] machine:
//!
//! ```text
//! NetworkPending ─► RolesResolved ─► SubsystemsProvisioning ─► NodesProvisioned
//!                ─► NodesStarted ─► HealthGated ─► Live
//!        (any phase) ─► Failed
//! ```
//!
//! # Failure
//!
//! The first fatal error ends the run. Stages already in flight are drained
//! so the returned [`OrchestrationFailure`] carries a handle to everything
//! that was created. Nothing is released automatically.
//!
//! # Shapes
//!
//! - [`ClusterShape::DataCenter`]: N nodes, shared home, load balancer
//! - [`ClusterShape::Standalone`]: one node talking straight to its database

pub mod cluster;

pub use cluster::{
    Cluster, DiagnosticClient, OrchestrationFailure, OrchestrationHistory, ProvisionedCluster,
};

use chrono::Utc;
use futures::future::join_all;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::artifacts::{ArtifactPreparation, ArtifactSources, PreparedArtifacts};
use crate::config::{OrchestratorConfig, ProductLayout};
use crate::domain::{validate_configs, ClusterRole, Investment, NodeConfig, RemoteLocation, SshKey};
use crate::errors::{ProvisioningError, ProvisioningResult};
use crate::node::{DatabaseDriver, HostToolkit, NodeAssignment, NodeProvisioner, NodeRole, StoppedNode};
use crate::provider::network::{DATA_CENTER_TEMPLATE, STANDALONE_TEMPLATE};
use crate::provider::{
    pick_availability_zones, ArtifactFetcher, BlobTransport, DatabaseFormula, LoadBalancerFormula,
    NetworkProvisioner, ProvisionedLoadBalancer, ProvisionedNetwork, StackParameter, StackSpec,
};
use crate::remote::with_session;
use crate::resource::ResourceHandle;
use crate::shared_home::{SharedHome, SharedHomeFormula};
use crate::stage::{timed, PlannedStages, StageFuture, StageId, StagePlan, StagePool};
use crate::state_machine::{History, OrchestrationEvent, OrchestrationState};
use crate::topology::ClusterTopology;

/// Layout of the cluster to build
#[derive(Clone)]
pub enum ClusterShape {
    /// Load-balanced nodes sharing a home over NFS
    DataCenter {
        load_balancer: Arc<dyn LoadBalancerFormula>,
    },
    /// A single node with its own home
    Standalone,
}

impl ClusterShape {
    fn template(&self) -> &'static str {
        match self {
            ClusterShape::DataCenter { .. } => DATA_CENTER_TEMPLATE,
            ClusterShape::Standalone => STANDALONE_TEMPLATE,
        }
    }

    fn availability_zones(&self) -> usize {
        match self {
            ClusterShape::DataCenter { .. } => 1,
            ClusterShape::Standalone => 2,
        }
    }

    fn singleton_roles(&self) -> Vec<ClusterRole> {
        match self {
            ClusterShape::DataCenter { .. } => vec![ClusterRole::Database, ClusterRole::SharedHome],
            ClusterShape::Standalone => vec![ClusterRole::Database],
        }
    }

    fn plan(&self, nodes: usize) -> ProvisioningResult<StagePlan> {
        let plan = match self {
            ClusterShape::DataCenter { .. } => StagePlan::data_center(nodes),
            ClusterShape::Standalone if nodes == 1 => StagePlan::standalone(),
            ClusterShape::Standalone => {
                return Err(ProvisioningError::Configuration(format!(
                    "a standalone cluster has exactly one node, {} configs given",
                    nodes
                )))
            }
        };
        plan.validate()?;
        Ok(plan)
    }
}

/// Inputs of one orchestration run
pub struct OrchestrationRequest {
    /// Node configs in provisioning order
    pub configs: Vec<NodeConfig>,
    pub investment: Investment,
    pub plugins_transport: Arc<dyn BlobTransport>,
    pub results_transport: Arc<dyn BlobTransport>,
    /// Key pair, possibly still being created
    pub key: StageFuture<SshKey>,
    /// Instance profile attached to every machine
    pub role_profile: String,
}

/// Provisions clusters of one shape
pub struct ClusterOrchestrator {
    config: Arc<OrchestratorConfig>,
    layout: Arc<ProductLayout>,
    shape: ClusterShape,
    network: Arc<dyn NetworkProvisioner>,
    database: Arc<dyn DatabaseFormula>,
    toolkit: HostToolkit,
    fetcher: Arc<dyn ArtifactFetcher>,
    sources: ArtifactSources,
    driver: DatabaseDriver,
}

/// Stage outcomes that own cloud resources
#[derive(Default)]
struct InFlight {
    network: Option<StageFuture<Arc<dyn ProvisionedNetwork>>>,
    load_balancer: Option<StageFuture<ProvisionedLoadBalancer>>,
}

impl InFlight {
    /// Handle to whatever settled successfully
    fn resource(&self) -> ResourceHandle {
        let network = self
            .network
            .as_ref()
            .and_then(StageFuture::peek)
            .and_then(Result::ok)
            .map(|network| network.resource());
        let load_balancer = self
            .load_balancer
            .as_ref()
            .and_then(StageFuture::peek)
            .and_then(Result::ok)
            .map(|lb| lb.resource);

        match (load_balancer, network) {
            (Some(lb), Some(network)) => ResourceHandle::compose(lb, network),
            (None, Some(network)) => network,
            (Some(lb), None) => lb,
            (None, None) => ResourceHandle::noop("nothing provisioned"),
        }
    }
}

/// Stage futures of one run
struct Submitted {
    network: StageFuture<Arc<dyn ProvisionedNetwork>>,
    topology: StageFuture<ClusterTopology>,
    load_balancer: Option<StageFuture<ProvisionedLoadBalancer>>,
    shared_home: Option<StageFuture<SharedHome>>,
    database: StageFuture<RemoteLocation>,
    database_start: StageFuture<()>,
    nodes: Vec<StageFuture<StoppedNode>>,
}

impl ClusterOrchestrator {
    pub fn builder(
        shape: ClusterShape,
        network: Arc<dyn NetworkProvisioner>,
        database: Arc<dyn DatabaseFormula>,
        toolkit: HostToolkit,
        fetcher: Arc<dyn ArtifactFetcher>,
    ) -> ClusterOrchestratorBuilder {
        ClusterOrchestratorBuilder {
            shape,
            network,
            database,
            toolkit,
            fetcher,
            config: OrchestratorConfig::default(),
            layout: ProductLayout::default(),
            sources: ArtifactSources::default(),
            driver: DatabaseDriver::default(),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Provision, start and health-gate a cluster
    pub async fn orchestrate(
        &self,
        request: OrchestrationRequest,
    ) -> Result<ProvisionedCluster, OrchestrationFailure> {
        let mut history = History::new(OrchestrationState::NetworkPending);
        let pool = StagePool::new("provision cluster", self.config.stage_pool);
        let mut in_flight = InFlight::default();
        let started = Instant::now();
        info!(
            "Provisioning {} node cluster [{}]",
            request.configs.len(),
            pool.correlation_id()
        );

        let outcome = self
            .provision(&request, &pool, &mut in_flight, &mut history)
            .await;

        match outcome {
            Ok((cluster, resource)) => {
                record(&mut history, OrchestrationEvent::ClusterAssembled);
                info!(
                    "Cluster at {} is live after {:?}",
                    cluster.address,
                    started.elapsed()
                );
                Ok(ProvisionedCluster {
                    cluster,
                    resource,
                    history: history.into_transitions(),
                })
            }
            Err(error) => {
                error!(
                    "Cluster provisioning failed after {:?}: {}",
                    started.elapsed(),
                    error
                );
                pool.drain().await;
                pool.shutdown_now();
                record(&mut history, OrchestrationEvent::Fail(error.to_string()));
                Err(OrchestrationFailure {
                    error,
                    resource: in_flight.resource(),
                    history: history.into_transitions(),
                })
            }
        }
    }

    async fn provision(
        &self,
        request: &OrchestrationRequest,
        pool: &StagePool,
        in_flight: &mut InFlight,
        history: &mut History<OrchestrationState>,
    ) -> ProvisioningResult<(Cluster, ResourceHandle)> {
        validate_configs(&request.configs)?;
        let plan = self.shape.plan(request.configs.len())?;
        let submitted = self.submit(request, &plan, pool, in_flight)?;

        let topology = submitted.topology.get().await?;
        record(history, OrchestrationEvent::NetworkResolved);
        info!(
            "Resolved {} application nodes and database {}",
            topology.nodes.len(),
            topology.database()?.private_address
        );
        record(history, OrchestrationEvent::SubsystemsSubmitted);

        let stopped = join_all(submitted.nodes.iter().map(StageFuture::get))
            .await
            .into_iter()
            .collect::<ProvisioningResult<Vec<StoppedNode>>>()?;
        let database = submitted.database.get().await?;
        submitted.database_start.get().await?;
        record(history, OrchestrationEvent::NodesProvisioned);

        let mut nodes = Vec::with_capacity(stopped.len());
        for node in stopped {
            let stage = format!("start {}", node.name);
            let began = Instant::now();
            let started = timed(&stage, node.start())
                .await
                .map_err(|e| e.in_stage(stage.as_str(), began.elapsed()))?;
            nodes.push(started);
        }
        record(history, OrchestrationEvent::NodesStarted);
        pool.shutdown_now();

        let address = match &submitted.load_balancer {
            Some(load_balancer) => {
                let load_balancer = load_balancer.get().await?;
                self.health_gate(&load_balancer).await?;
                load_balancer.load_balancer.uri().clone()
            }
            None => {
                debug!("No load balancer, skipping health gate");
                node_address(nodes[0].access.target.address(), self.config.application_port)?
            }
        };
        record(history, OrchestrationEvent::HealthConfirmed);

        let network = submitted.network.get().await?;
        let resource = match &submitted.load_balancer {
            Some(load_balancer) => {
                ResourceHandle::compose(load_balancer.get().await?.resource, network.resource())
            }
            None => network.resource(),
        };
        let home = match &submitted.shared_home {
            Some(shared_home) => shared_home.get().await?.location(),
            None => nodes[0].home_location(),
        };
        let diagnostic_clients = nodes
            .iter()
            .filter_map(|node| {
                node.jmx_port.map(|port| DiagnosticClient {
                    host: node.access.target.address().to_string(),
                    port,
                })
            })
            .collect();
        info!("Stack expires at {}", network.expiry());

        Ok((
            Cluster {
                nodes,
                home,
                database,
                address,
                diagnostic_clients,
            },
            resource,
        ))
    }

    /// Wait for the load balancer, bounded by the health gate timeout
    ///
    /// Any failure once the timeout has elapsed is a health gate timeout,
    /// whether the load balancer gave up on its own or was cut off.
    async fn health_gate(&self, load_balancer: &ProvisionedLoadBalancer) -> ProvisioningResult<()> {
        let timeout = self.config.health_gate_timeout;
        let began = Instant::now();
        let outcome = match tokio::time::timeout(
            timeout,
            load_balancer.load_balancer.wait_until_healthy(timeout),
        )
        .await
        {
            Ok(Err(e)) if began.elapsed() >= timeout => {
                warn!("Load balancer gave up after {:?}: {}", began.elapsed(), e);
                Err(ProvisioningError::HealthGateTimeout { timeout })
            }
            Ok(outcome) => outcome,
            Err(_) => Err(ProvisioningError::HealthGateTimeout { timeout }),
        };
        outcome.map_err(|e| e.in_stage("wait for load balancer", began.elapsed()))?;
        info!(
            "Load balancer {} healthy after {:?}",
            load_balancer.load_balancer.uri(),
            began.elapsed()
        );
        Ok(())
    }

    /// Submit every stage of `plan`
    fn submit(
        &self,
        request: &OrchestrationRequest,
        plan: &StagePlan,
        pool: &StagePool,
        in_flight: &mut InFlight,
    ) -> ProvisioningResult<Submitted> {
        let mut stages = PlannedStages::new(pool, plan);
        let key = stages.adopt(StageId::Credentials, request.key.clone())?;

        let network = {
            let provisioner = self.network.clone();
            let key = key.clone();
            let shape = self.shape.clone();
            let config = self.config.clone();
            let instance_type = self.toolkit.host.instance_type().to_string();
            let investment = request.investment.clone();
            let role_profile = request.role_profile.clone();
            let node_names: Vec<String> = request.configs.iter().map(|c| c.name.clone()).collect();
            stages.submit(StageId::Network, move |context| async move {
                let key = key.get().await?;
                let zones = provisioner.availability_zones().await?;
                let image = provisioner.default_image().await?;
                let spec = StackSpec {
                    template: shape.template().to_string(),
                    node_names,
                    parameters: stack_parameters(
                        &shape,
                        &config,
                        &zones,
                        &key,
                        &role_profile,
                        &image,
                        &instance_type,
                    )?,
                    tags: investment.tags(Utc::now()),
                    creation_timeout: config.stack_creation_timeout,
                };
                info!("{}: creating stack from {}", context, spec.template);
                timed("provision stack", provisioner.provision(spec)).await
            })?
        };
        in_flight.network = Some(network.clone());

        let artifacts = {
            let preparation = ArtifactPreparation::new(
                self.sources.clone(),
                self.fetcher.clone(),
                request.plugins_transport.clone(),
            );
            let configs = request.configs.clone();
            stages.submit(StageId::ArtifactPreparation, move |_| async move {
                timed("prepare artifacts", preparation.prepare(&configs)).await
            })?
        };

        let topology = {
            let network = network.clone();
            let configs = request.configs.clone();
            let roles = self.shape.singleton_roles();
            stages.submit(StageId::RoleResolution, move |_| async move {
                let machines = network.get().await?.list_machines().await?;
                ClusterTopology::resolve(&machines, &configs, &roles)
            })?
        };

        let load_balancer = match &self.shape {
            ClusterShape::DataCenter { load_balancer } => {
                let formula = load_balancer.clone();
                let (network, topology, key) = (network.clone(), topology.clone(), key.clone());
                let investment = request.investment.clone();
                let future = stages.submit(StageId::LoadBalancer, move |_| async move {
                    let network = network.get().await?;
                    let instances = topology.get().await?.application_machines();
                    let key = key.get().await?;
                    timed(
                        "provision load balancer",
                        formula.provision(&investment, &instances, network, &key),
                    )
                    .await
                })?;
                in_flight.load_balancer = Some(future.clone());
                Some(future)
            }
            ClusterShape::Standalone => None,
        };

        let shared_home = match &self.shape {
            ClusterShape::DataCenter { .. } => {
                let formula = SharedHomeFormula::new(
                    self.toolkit.executor.clone(),
                    self.toolkit.home.clone(),
                    self.config.connect_retry,
                    self.config.extraction_timeout,
                );
                let (topology, artifacts, key) = (topology.clone(), artifacts.clone(), key.clone());
                let login_user = self.config.login_user.clone();
                Some(stages.submit(StageId::SharedHome, move |_| async move {
                    let topology = topology.get().await?;
                    let artifacts = artifacts.get().await?;
                    let key = key.get().await?;
                    timed(
                        "provision shared home",
                        formula.provision(topology.shared_home()?, &key, &login_user, &artifacts),
                    )
                    .await
                })?)
            }
            ClusterShape::Standalone => None,
        };

        let database = {
            let formula = self.database.clone();
            let executor = self.toolkit.executor.clone();
            let (topology, key) = (topology.clone(), key.clone());
            let config = self.config.clone();
            stages.submit(StageId::Database, move |_| async move {
                let topology = topology.get().await?;
                let key = key.get().await?;
                let target = key.target(
                    topology.database()?.public_address.to_string(),
                    config.login_user.clone(),
                );
                let path = with_session(
                    executor.as_ref(),
                    &target,
                    &config.connect_retry,
                    move |session| async move { formula.setup(session.as_ref()).await },
                )
                .await?;
                Ok(RemoteLocation::new(target, path))
            })?
        };

        let database_start = {
            let formula = self.database.clone();
            let executor = self.toolkit.executor.clone();
            let config = self.config.clone();
            let location = database.clone();
            let load_balancer = load_balancer.clone();
            let topology = topology.clone();
            stages.submit(StageId::DatabaseStart, move |_| async move {
                let location = location.get().await?;
                let application = match load_balancer {
                    Some(load_balancer) => load_balancer.get().await?.load_balancer.uri().clone(),
                    None => {
                        let topology = topology.get().await?;
                        let node = topology.nodes.first().ok_or_else(|| {
                            ProvisioningError::Configuration("no application node".to_string())
                        })?;
                        node_address(
                            &node.machine.public_address.to_string(),
                            config.application_port,
                        )?
                    }
                };
                let application = &application;
                with_session(
                    executor.as_ref(),
                    &location.host,
                    &config.connect_retry,
                    move |session| async move { formula.start(application, session.as_ref()).await },
                )
                .await
            })?
        };

        let provisioner = Arc::new(NodeProvisioner::new(
            self.toolkit.clone(),
            self.config.clone(),
            self.layout.clone(),
            self.driver.clone(),
            request.results_transport.clone(),
        ));
        let mut nodes = Vec::with_capacity(request.configs.len());
        for index in 0..request.configs.len() {
            let provisioner = provisioner.clone();
            let (topology, artifacts, key) = (topology.clone(), artifacts.clone(), key.clone());
            let shared_home = shared_home.clone();
            nodes.push(stages.submit(StageId::Node(index), move |_| async move {
                let topology = topology.get().await?;
                let artifacts: PreparedArtifacts = artifacts.get().await?;
                let key = key.get().await?;
                let binding = topology.nodes.get(index).cloned().ok_or_else(|| {
                    ProvisioningError::Configuration(format!("no machine bound to node {}", index))
                })?;
                let role = match shared_home {
                    Some(shared_home) => NodeRole::DataCenter {
                        node_index: index,
                        shared_home: shared_home.get().await?,
                    },
                    None => NodeRole::Standalone,
                };
                let assignment = NodeAssignment {
                    binding,
                    key,
                    database: topology.database()?.private_address.to_string(),
                    role,
                };
                provisioner.provision(assignment, &artifacts).await
            })?);
        }

        Ok(Submitted {
            network,
            topology,
            load_balancer,
            shared_home,
            database,
            database_start,
            nodes,
        })
    }
}

/// Parameters of the stack template
fn stack_parameters(
    shape: &ClusterShape,
    config: &OrchestratorConfig,
    zones: &[String],
    key: &SshKey,
    role_profile: &str,
    image: &str,
    instance_type: &str,
) -> ProvisioningResult<Vec<StackParameter>> {
    let picked = pick_availability_zones(
        zones,
        &config.excluded_zones,
        shape.availability_zones(),
        &mut rand::thread_rng(),
    )?;

    let mut parameters = vec![
        StackParameter::new("KeyName", key.remote_name.clone()),
        StackParameter::new("InstanceProfile", role_profile),
        StackParameter::new("Ami", image),
        StackParameter::new("JiraInstanceType", instance_type),
    ];
    for (i, zone) in picked.into_iter().enumerate() {
        let name = match i {
            0 => "AvailabilityZone".to_string(),
            n => format!("AvailabilityZone{}", n + 1),
        };
        parameters.push(StackParameter::new(name, zone));
    }
    Ok(parameters)
}

/// HTTP root of a node
fn node_address(host: &str, port: u16) -> ProvisioningResult<Url> {
    let host = match host.parse::<IpAddr>() {
        Ok(IpAddr::V6(ip)) => format!("[{}]", ip),
        _ => host.to_string(),
    };
    Url::parse(&format!("http://{}:{}/", host, port)).map_err(|e| {
        ProvisioningError::Configuration(format!("invalid node address {}: {}", host, e))
    })
}

fn record(history: &mut History<OrchestrationState>, event: OrchestrationEvent) {
    let from = history.state().clone();
    match history.record(event, Utc::now()) {
        Ok(to) => debug!("Orchestration {} -> {}", from, to),
        Err(e) => warn!("Orchestration state not recorded: {}", e),
    }
}

/// Fluent construction of a [`ClusterOrchestrator`]
pub struct ClusterOrchestratorBuilder {
    shape: ClusterShape,
    network: Arc<dyn NetworkProvisioner>,
    database: Arc<dyn DatabaseFormula>,
    toolkit: HostToolkit,
    fetcher: Arc<dyn ArtifactFetcher>,
    config: OrchestratorConfig,
    layout: ProductLayout,
    sources: ArtifactSources,
    driver: DatabaseDriver,
}

impl ClusterOrchestratorBuilder {
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn layout(mut self, layout: ProductLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn artifacts(mut self, sources: ArtifactSources) -> Self {
        self.sources = sources;
        self
    }

    pub fn driver(mut self, driver: DatabaseDriver) -> Self {
        self.driver = driver;
        self
    }

    pub fn build(self) -> ClusterOrchestrator {
        ClusterOrchestrator {
            config: Arc::new(self.config),
            layout: Arc::new(self.layout),
            shape: self.shape,
            network: self.network,
            database: self.database,
            toolkit: self.toolkit,
            fetcher: self.fetcher,
            sources: self.sources,
            driver: self.driver,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_node_address() {
        assert_eq!(
            node_address("54.0.0.1", 8080).unwrap().as_str(),
            "http://54.0.0.1:8080/"
        );
        assert_eq!(
            node_address("2001:db8::1", 8080).unwrap().as_str(),
            "http://[2001:db8::1]:8080/"
        );
    }

    #[test]
    fn test_standalone_stack_has_two_zones() {
        let zones: Vec<String> = ["eu-central-1a", "eu-central-1b", "eu-central-1c"]
            .iter()
            .map(|z| z.to_string())
            .collect();
        let parameters = stack_parameters(
            &ClusterShape::Standalone,
            &OrchestratorConfig::default(),
            &zones,
            &SshKey::new("perf-key", "/keys/perf.pem"),
            "perf-role",
            "ami-123",
            "c5.2xlarge",
        )
        .unwrap();

        let keys: Vec<&str> = parameters.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "KeyName",
                "InstanceProfile",
                "Ami",
                "JiraInstanceType",
                "AvailabilityZone",
                "AvailabilityZone2"
            ]
        );
        assert!(parameters
            .iter()
            .all(|p| p.value != "eu-central-1c"));
    }

    #[test]
    fn test_standalone_rejects_many_nodes() {
        let error = ClusterShape::Standalone.plan(2).unwrap_err();
        assert!(matches!(error, ProvisioningError::Configuration(_)));
    }
}
