// Copyright (c) 2025 - Cowboy AI, Inc.
//! Load balancer contract

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::domain::{Investment, Machine, SshKey};
use crate::errors::ProvisioningResult;
use crate::provider::ProvisionedNetwork;
use crate::resource::ResourceHandle;

/// A running load balancer
#[async_trait]
pub trait LoadBalancer: Send + Sync {
    /// Load-balanced entry point of the cluster
    fn uri(&self) -> &Url;

    /// Resolve once every registered target reports healthy
    ///
    /// `timeout` is advisory; the orchestrator enforces it independently.
    async fn wait_until_healthy(&self, timeout: Duration) -> ProvisioningResult<()>;
}

/// Provisions a load balancer in front of a set of application machines
#[async_trait]
pub trait LoadBalancerFormula: Send + Sync {
    async fn provision(
        &self,
        investment: &Investment,
        instances: &[Machine],
        network: Arc<dyn ProvisionedNetwork>,
        key: &SshKey,
    ) -> ProvisioningResult<ProvisionedLoadBalancer>;
}

/// Load balancer plus the handle that releases it
#[derive(Clone)]
pub struct ProvisionedLoadBalancer {
    pub load_balancer: Arc<dyn LoadBalancer>,
    pub resource: ResourceHandle,
}

impl fmt::Debug for ProvisionedLoadBalancer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionedLoadBalancer")
            .field("uri", &self.load_balancer.uri().as_str())
            .field("resource", &self.resource)
            .finish()
    }
}
