// Copyright (c) 2025 - Cowboy AI, Inc.
//! The live cluster and orchestration outcomes

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use url::Url;

use crate::domain::RemoteLocation;
use crate::errors::{ProvisioningError, ProvisioningResult};
use crate::node::StartedNode;
use crate::resource::ResourceHandle;
use crate::results::MeasurementSource;
use crate::state_machine::{OrchestrationEvent, OrchestrationState, TransitionRecord};

/// Timestamped transitions of one orchestration run
pub type OrchestrationHistory = Vec<TransitionRecord<OrchestrationState, OrchestrationEvent>>;

/// JMX endpoint of a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiagnosticClient {
    pub host: String,
    pub port: u16,
}

/// A provisioned, started and healthy cluster
///
/// Immutable once assembled.
#[derive(Debug, Clone)]
pub struct Cluster {
    /// Started nodes, in node config order
    pub nodes: Vec<StartedNode>,
    /// Application home (the shared home in a data-center cluster)
    pub home: RemoteLocation,
    /// Database data
    pub database: RemoteLocation,
    /// Entry point of the cluster
    pub address: Url,
    pub diagnostic_clients: Vec<DiagnosticClient>,
}

impl Cluster {
    /// Every node as a results source
    pub fn measurement_sources(&self) -> Vec<Arc<dyn MeasurementSource>> {
        self.nodes
            .iter()
            .map(|node| Arc::new(node.clone()) as Arc<dyn MeasurementSource>)
            .collect()
    }

    /// Stop every node, reporting the first failure
    pub async fn stop(&self) -> ProvisioningResult<()> {
        join_all(self.nodes.iter().map(|node| node.stop()))
            .await
            .into_iter()
            .collect::<ProvisioningResult<Vec<()>>>()
            .map(|_| ())
    }
}

/// Successful orchestration: the cluster and what releases it
#[derive(Debug, Clone)]
pub struct ProvisionedCluster {
    pub cluster: Cluster,
    /// Releases the load balancer, then the network stack
    pub resource: ResourceHandle,
    pub history: OrchestrationHistory,
}

/// Failed orchestration
///
/// `resource` covers everything created before the failure. Nothing is
/// released automatically; the caller must release it.
#[derive(Debug, Error)]
#[error("Cluster provisioning failed: {error}")]
pub struct OrchestrationFailure {
    #[source]
    pub error: ProvisioningError,
    pub resource: ResourceHandle,
    pub history: OrchestrationHistory,
}
