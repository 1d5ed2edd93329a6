// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cluster Domain Models
//!
//! Immutable value objects shared by every provisioning stage.
//!
//! - [`RemoteTarget`] - address, login and key of a machine
//! - [`RemoteLocation`] - durable path on a remote machine
//! - [`SshKey`] - provider key pair used for every login
//! - [`Investment`] - purpose and lifespan of created resources
//! - [`Machine`] / [`Tag`] / [`ClusterRole`] - tagged instances and their roles
//! - [`NodeConfig`] - per-node identity and tuning

pub mod investment;
pub mod machine;
pub mod node_config;
pub mod remote;

pub use investment::Investment;
pub use machine::{ClusterRole, Machine, Tag};
pub use node_config::{
    validate_configs, DiagnosticsConfig, JvmArgs, LaunchTimeouts, NodeConfig, NodeConfigBuilder,
};
pub use remote::{RemoteLocation, RemoteTarget, SshKey};
