// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network and compute stack contract
//!
//! The orchestrator describes the stack it needs as a [`StackSpec`]: a named
//! template, the stack parameters and the investment tags. The provisioner
//! polls stack creation for at most [`StackSpec::creation_timeout`] and
//! returns an opaque [`ProvisionedNetwork`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::Machine;
use crate::errors::{ProvisioningError, ProvisioningResult};
use crate::resource::ResourceHandle;

/// Stack template of a load-balanced cluster with shared home
pub const DATA_CENTER_TEMPLATE: &str = "2-nodes-dc.yaml";

/// Stack template of a single application node
pub const STANDALONE_TEMPLATE: &str = "single-node.yaml";

/// One key/value parameter of a stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackParameter {
    pub key: String,
    pub value: String,
}

impl StackParameter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Everything the provisioner needs to create a stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSpec {
    /// Template name, e.g. [`DATA_CENTER_TEMPLATE`]
    pub template: String,
    /// Application node names, used to adapt the template
    pub node_names: Vec<String>,
    pub parameters: Vec<StackParameter>,
    /// Investment tags attached to every created resource
    pub tags: Vec<(String, String)>,
    pub creation_timeout: Duration,
}

impl StackSpec {
    /// Value of a parameter
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|parameter| parameter.key == key)
            .map(|parameter| parameter.value.as_str())
    }
}

/// A created network and compute stack
#[async_trait]
pub trait ProvisionedNetwork: Send + Sync {
    /// Every machine of the stack; enumeration order is not stable
    async fn list_machines(&self) -> ProvisioningResult<Vec<Machine>>;

    fn find_subnet(&self, name: &str) -> Option<String>;

    fn find_vpc(&self, name: &str) -> Option<String>;

    /// When the stack may be reclaimed
    fn expiry(&self) -> DateTime<Utc>;

    /// Handle that deletes the stack
    fn resource(&self) -> ResourceHandle;
}

/// Creates network and compute stacks
#[async_trait]
pub trait NetworkProvisioner: Send + Sync {
    async fn availability_zones(&self) -> ProvisioningResult<Vec<String>>;

    /// Machine image used when the caller does not choose one
    async fn default_image(&self) -> ProvisioningResult<String>;

    async fn provision(&self, spec: StackSpec) -> ProvisioningResult<Arc<dyn ProvisionedNetwork>>;
}

/// Pick `count` distinct zones at random, never one of `excluded`
pub fn pick_availability_zones<R: Rng + ?Sized>(
    zones: &[String],
    excluded: &[String],
    count: usize,
    rng: &mut R,
) -> ProvisioningResult<Vec<String>> {
    let eligible: Vec<&String> = zones
        .iter()
        .filter(|zone| !excluded.contains(zone))
        .collect();
    if eligible.len() < count {
        return Err(ProvisioningError::Configuration(format!(
            "need {} availability zones, only {} of {:?} are eligible",
            count,
            eligible.len(),
            zones
        )));
    }
    Ok(eligible
        .choose_multiple(rng, count)
        .map(|zone| zone.to_string())
        .collect())
}
