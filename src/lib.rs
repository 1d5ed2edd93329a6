//! Performance-test cluster provisioning
//!
//! This crate turns a list of node configurations into a running,
//! load-balanced application cluster on freshly provisioned cloud machines.
//! Independent subsystems (network stack, artifacts, load balancer, shared
//! home, database, application nodes) are provisioned concurrently on a
//! dependency-ordered stage pool; everything created is returned as one
//! releasable resource handle.
//!
//! Cloud APIs, the remote shell transport, blob storage and host installers
//! are consumed through traits in [`provider`] and [`remote`].

pub mod artifacts;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod node;
pub mod orchestrator;
pub mod provider;
pub mod remote;
pub mod resource;
pub mod results;
pub mod shared_home;
pub mod stage;
pub mod state_machine;
pub mod topology;

// Re-export commonly used types
pub use config::{OrchestratorConfig, ProductLayout};
pub use domain::{Investment, Machine, NodeConfig, RemoteLocation, RemoteTarget, SshKey};
pub use errors::{ErrorKind, ProvisioningError, ProvisioningResult};
pub use orchestrator::{
    Cluster, ClusterOrchestrator, ClusterShape, OrchestrationFailure, OrchestrationRequest,
    ProvisionedCluster,
};
pub use resource::{Resource, ResourceHandle};
pub use results::{gather_results, GatheredResults, ResultsGatherer};
pub use stage::{PoolSize, StageFuture, StagePool};
