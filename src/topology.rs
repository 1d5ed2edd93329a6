// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cluster Topology Resolution
//!
//! Classifies the machines of a provisioned network into cluster roles by
//! tag and binds application machines to node configs.
//!
//! # Invariants
//!
//! - Every singleton role (database, shared home) matches exactly one machine
//! - Exactly `configs.len()` machines carry the application-node tag
//! - Application machines are sorted by (private, public) address before
//!   being zipped with configs, so config `i` always binds to the `i`-th
//!   machine in address order, whatever order the provider enumerated them in
//!
//! Any violation is a [`ProvisioningError::Configuration`]; the resolver
//! never silently picks one of several candidates.

use std::collections::HashMap;

use crate::domain::{ClusterRole, Machine, NodeConfig};
use crate::errors::{ProvisioningError, ProvisioningResult};

/// One application node config bound to its machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeBinding {
    /// Position in the caller-supplied config order
    pub index: usize,
    pub config: NodeConfig,
    pub machine: Machine,
}

/// Machines of a cluster, by role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterTopology {
    pub nodes: Vec<NodeBinding>,
    singletons: HashMap<ClusterRole, Machine>,
}

impl ClusterTopology {
    /// Resolve roles over `machines`
    ///
    /// `singletons` lists the roles that must be played by exactly one
    /// machine.
    pub fn resolve(
        machines: &[Machine],
        configs: &[NodeConfig],
        singletons: &[ClusterRole],
    ) -> ProvisioningResult<Self> {
        let mut resolved = HashMap::new();
        for role in singletons {
            resolved.insert(*role, single(machines, *role)?);
        }

        let mut application: Vec<&Machine> = machines
            .iter()
            .filter(|machine| machine.has_role(ClusterRole::ApplicationNode))
            .collect();
        if application.len() != configs.len() {
            return Err(ProvisioningError::Configuration(format!(
                "expected {} machines tagged {}, found {}",
                configs.len(),
                ClusterRole::ApplicationNode.tag(),
                application.len()
            )));
        }
        application.sort_by(|a, b| Machine::by_address(a, b));

        let nodes = configs
            .iter()
            .zip(application)
            .enumerate()
            .map(|(index, (config, machine))| NodeBinding {
                index,
                config: config.clone(),
                machine: machine.clone(),
            })
            .collect();

        Ok(Self {
            nodes,
            singletons: resolved,
        })
    }

    /// The machine playing a singleton role
    pub fn machine(&self, role: ClusterRole) -> ProvisioningResult<&Machine> {
        self.singletons.get(&role).ok_or_else(|| {
            ProvisioningError::Configuration(format!("role '{}' was not resolved", role))
        })
    }

    pub fn database(&self) -> ProvisioningResult<&Machine> {
        self.machine(ClusterRole::Database)
    }

    pub fn shared_home(&self) -> ProvisioningResult<&Machine> {
        self.machine(ClusterRole::SharedHome)
    }

    /// Application machines in binding order
    pub fn application_machines(&self) -> Vec<Machine> {
        self.nodes.iter().map(|node| node.machine.clone()).collect()
    }
}

fn single(machines: &[Machine], role: ClusterRole) -> ProvisioningResult<Machine> {
    let mut matches = machines.iter().filter(|machine| machine.has_role(role));
    match (matches.next(), matches.next()) {
        (Some(machine), None) => Ok(machine.clone()),
        (None, _) => Err(ProvisioningError::Configuration(format!(
            "no machine tagged {} for role '{}'",
            role.tag(),
            role
        ))),
        (Some(_), Some(_)) => Err(ProvisioningError::Configuration(format!(
            "{} machines tagged {} for role '{}', expected exactly one",
            2 + matches.count(),
            role.tag(),
            role
        ))),
    }
}
