// Copyright (c) 2025 - Cowboy AI, Inc.
//! Single-machine installers
//!
//! Low-level collaborators that configure one machine over an open session.
//! The node provisioner sequences them; it does not know how they work.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::ProvisioningResult;
use crate::remote::RemoteSession;

/// Prepares the OS and storage layout of an application machine
#[async_trait]
pub trait HostSetup: Send + Sync {
    /// Instance type the stack should use for application machines
    fn instance_type(&self) -> &str;

    async fn setup(&self, session: &dyn RemoteSession) -> ProvisioningResult<()>;
}

/// Source of the application archive
#[async_trait]
pub trait ApplicationArchive: Send + Sync {
    /// Download the archive into `directory`, returning the archive path
    async fn download(&self, session: &dyn RemoteSession, directory: &str)
        -> ProvisioningResult<String>;
}

/// Source of the application's durable home directory
#[async_trait]
pub trait HomeSource: Send + Sync {
    /// Download and unpack the home, returning its path
    async fn download(&self, session: &dyn RemoteSession) -> ProvisioningResult<String>;
}

/// Installs the runtime platform, e.g. a JDK
#[async_trait]
pub trait RuntimeInstaller: Send + Sync {
    async fn install(&self, session: &dyn RemoteSession) -> ProvisioningResult<()>;

    /// Value of `JAVA_HOME` once installed
    fn home(&self) -> &str;
}

/// Baseline OS metrics taken before the test
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsMetrics {
    pub captured_at: Option<DateTime<Utc>>,
    pub values: BTreeMap<String, String>,
}

/// Captures baseline OS metrics
#[async_trait]
pub trait OsMetricsProbe: Send + Sync {
    async fn capture(&self, session: &dyn RemoteSession) -> ProvisioningResult<OsMetrics>;
}

/// Log forwarding agent
#[async_trait]
pub trait DiagnosticAgent: Send + Sync {
    /// Install the agent and forward `log_dir` under `node_name`
    async fn install(
        &self,
        session: &dyn RemoteSession,
        node_name: &str,
        log_dir: &str,
    ) -> ProvisioningResult<()>;
}

/// Fetches a URI onto the orchestrating host
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(&self, uri: &str, destination: &Path) -> ProvisioningResult<()>;
}
