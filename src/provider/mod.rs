// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provider Collaborators
//!
//! Contracts of the external systems the orchestrator drives. The crate
//! ships no cloud client; callers plug their own implementations in.
//!
//! - [`NetworkProvisioner`] - creates the network and compute stack
//! - [`LoadBalancerFormula`] - puts a load balancer in front of the nodes
//! - [`DatabaseFormula`] - sets up and starts the database
//! - [`BlobTransport`] - moves artifacts through object storage
//! - [`host`] - single-machine installers (OS, archive, home, JDK, agents)

pub mod database;
pub mod host;
pub mod load_balancer;
pub mod network;
pub mod storage;

pub use database::DatabaseFormula;
pub use host::{
    ApplicationArchive, ArtifactFetcher, DiagnosticAgent, HomeSource, HostSetup, OsMetrics,
    OsMetricsProbe, RuntimeInstaller,
};
pub use load_balancer::{LoadBalancer, LoadBalancerFormula, ProvisionedLoadBalancer};
pub use network::{
    pick_availability_zones, NetworkProvisioner, ProvisionedNetwork, StackParameter, StackSpec,
};
pub use storage::{BlobTransport, StorageLocation};
