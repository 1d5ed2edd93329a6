// Copyright (c) 2025 - Cowboy AI, Inc.
//! Node Configuration
//!
//! One [`NodeConfig`] per planned application node. Configs are supplied in
//! provisioning order; the order is significant because configs are bound to
//! machines positionally.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::errors::{ProvisioningError, ProvisioningResult};

/// JVM heap and extra flags for one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JvmArgs {
    pub xms: String,
    pub xmx: String,
    pub extra: Vec<String>,
}

impl JvmArgs {
    pub fn new(xms: impl Into<String>, xmx: impl Into<String>) -> Self {
        Self {
            xms: xms.into(),
            xmx: xmx.into(),
            extra: Vec::new(),
        }
    }

    pub fn with_extra(mut self, flag: impl Into<String>) -> Self {
        self.extra.push(flag.into());
        self
    }
}

impl Default for JvmArgs {
    fn default() -> Self {
        Self::new("2048m", "2048m")
    }
}

/// How long a starting node may take in each phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchTimeouts {
    /// Before the node answers HTTP at all
    pub offline: Duration,
    /// Until the node reports it is running
    pub initialization: Duration,
    /// For upgrade tasks to finish after start
    pub upgrade: Duration,
    /// Tolerated gap between two successful probes
    pub unresponsive: Duration,
}

impl LaunchTimeouts {
    /// Upper bound of the whole start sequence
    pub fn total(&self) -> Duration {
        self.offline + self.initialization + self.upgrade
    }
}

impl Default for LaunchTimeouts {
    fn default() -> Self {
        Self {
            offline: Duration::from_secs(8 * 60),
            initialization: Duration::from_secs(15 * 60),
            upgrade: Duration::from_secs(8 * 60),
            unresponsive: Duration::from_secs(4 * 60),
        }
    }
}

/// Diagnostic agents attached to a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Remote JMX port, when JMX is exposed
    pub remote_jmx_port: Option<u16>,
    /// URIs of collectd configuration snippets
    pub collectd_configs: Vec<String>,
    /// Forward application logs to the log aggregation agent
    pub log_forwarding: bool,
}

/// Identity and tuning of one application node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    pub jvm_args: JvmArgs,
    pub launch_timeouts: LaunchTimeouts,
    pub diagnostics: DiagnosticsConfig,
}

impl NodeConfig {
    /// Builder pattern for fluent construction
    pub fn builder(name: impl Into<String>) -> NodeConfigBuilder {
        NodeConfigBuilder::new(name)
    }

    /// Default configs named `jira-node-1` .. `jira-node-N`
    pub fn numbered(count: usize) -> Vec<NodeConfig> {
        (1..=count)
            .map(|i| NodeConfig::builder(format!("jira-node-{}", i)).build())
            .collect()
    }
}

/// Check that a set of configs can describe one cluster
///
/// # Invariants
/// - At least one config
/// - Names are non-empty and unique within the cluster
pub fn validate_configs(configs: &[NodeConfig]) -> ProvisioningResult<()> {
    if configs.is_empty() {
        return Err(ProvisioningError::Configuration(
            "at least one node config is required".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for config in configs {
        if config.name.trim().is_empty() {
            return Err(ProvisioningError::Configuration(
                "node name must not be empty".to_string(),
            ));
        }
        if !seen.insert(config.name.as_str()) {
            return Err(ProvisioningError::Configuration(format!(
                "duplicate node name: {}",
                config.name
            )));
        }
    }
    Ok(())
}

/// Builder for NodeConfig with fluent API
pub struct NodeConfigBuilder {
    config: NodeConfig,
}

impl NodeConfigBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            config: NodeConfig {
                name: name.into(),
                jvm_args: JvmArgs::default(),
                launch_timeouts: LaunchTimeouts::default(),
                diagnostics: DiagnosticsConfig::default(),
            },
        }
    }

    pub fn jvm_args(mut self, jvm_args: JvmArgs) -> Self {
        self.config.jvm_args = jvm_args;
        self
    }

    pub fn launch_timeouts(mut self, launch_timeouts: LaunchTimeouts) -> Self {
        self.config.launch_timeouts = launch_timeouts;
        self
    }

    pub fn remote_jmx(mut self, port: u16) -> Self {
        self.config.diagnostics.remote_jmx_port = Some(port);
        self
    }

    pub fn collectd_config(mut self, uri: impl Into<String>) -> Self {
        self.config.diagnostics.collectd_configs.push(uri.into());
        self
    }

    pub fn log_forwarding(mut self, enabled: bool) -> Self {
        self.config.diagnostics.log_forwarding = enabled;
        self
    }

    pub fn build(self) -> NodeConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = NodeConfig::builder("jira-node-1").build();
        assert_eq!(config.name, "jira-node-1");
        assert_eq!(config.jvm_args.xmx, "2048m");
        assert_eq!(config.diagnostics.remote_jmx_port, None);
        assert_eq!(config.launch_timeouts.initialization, Duration::from_secs(900));
    }

    #[test]
    fn test_numbered_configs_keep_order() {
        let names: Vec<String> = NodeConfig::numbered(3).into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["jira-node-1", "jira-node-2", "jira-node-3"]);
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let configs = vec![
            NodeConfig::builder("a").build(),
            NodeConfig::builder("a").build(),
        ];
        assert!(matches!(
            validate_configs(&configs),
            Err(ProvisioningError::Configuration(_))
        ));
    }

    #[test]
    fn test_empty_config_list_is_rejected() {
        assert!(validate_configs(&[]).is_err());
        assert!(validate_configs(&NodeConfig::numbered(2)).is_ok());
    }
}
