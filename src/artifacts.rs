// Copyright (c) 2025 - Cowboy AI, Inc.
//! Artifact Preparation
//!
//! Runs on the orchestrating host while the network is being created. It
//! stages everything the nodes later sync from the plugins transport:
//!
//! ```text
//! <staging>/
//! ├── installed-plugins/   application plugins   (mandatory)
//! ├── collectd.conf.d/     <SHA-256 of URI>.conf (best-effort)
//! └── collectdjars/        agent jars            (mandatory)
//! ```
//!
//! and uploads each staged directory. An agent config that cannot be
//! fetched is logged and skipped; a missing plugin or jar fails the stage.

use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::NodeConfig;
use crate::errors::{ProvisioningError, ProvisioningResult};
use crate::provider::{ArtifactFetcher, BlobTransport, StorageLocation};

/// Staged application plugins
pub const APPS_DIR: &str = "installed-plugins";

/// Staged monitoring agent configs
pub const AGENT_CONFIGS_DIR: &str = "collectd.conf.d";

/// Staged monitoring agent jars
pub const AGENT_JARS_DIR: &str = "collectdjars";

/// File name under which an agent config fetched from `uri` is staged
///
/// The name is the uppercase hex SHA-256 of the URI. Layouts staged by
/// tooling that names these files by MD5 are not interchangeable with ours.
pub fn agent_config_file_name(uri: &str) -> String {
    format!("{}.conf", hex::encode_upper(Sha256::digest(uri.as_bytes())))
}

/// Local files to stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactSources {
    pub plugins: Vec<PathBuf>,
    pub agent_jars: Vec<PathBuf>,
}

/// What the preparation stage uploaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedArtifacts {
    pub location: StorageLocation,
    /// File names of the agent configs that were actually staged
    pub agent_configs: BTreeSet<String>,
}

/// Stages and uploads plugins and agent artifacts
pub struct ArtifactPreparation {
    sources: ArtifactSources,
    fetcher: Arc<dyn ArtifactFetcher>,
    transport: Arc<dyn BlobTransport>,
}

impl ArtifactPreparation {
    pub fn new(
        sources: ArtifactSources,
        fetcher: Arc<dyn ArtifactFetcher>,
        transport: Arc<dyn BlobTransport>,
    ) -> Self {
        Self {
            sources,
            fetcher,
            transport,
        }
    }

    /// Stage every artifact needed by `configs` and upload it
    pub async fn prepare(&self, configs: &[NodeConfig]) -> ProvisioningResult<PreparedArtifacts> {
        let staging = tempfile::tempdir()?;
        let apps = staging.path().join(APPS_DIR);
        let agent_configs = staging.path().join(AGENT_CONFIGS_DIR);
        let agent_jars = staging.path().join(AGENT_JARS_DIR);
        for dir in [&apps, &agent_configs, &agent_jars] {
            tokio::fs::create_dir_all(dir).await?;
        }

        stage_files(&self.sources.plugins, &apps).await?;
        let staged_configs = self.stage_agent_configs(configs, &agent_configs).await;
        stage_files(&self.sources.agent_jars, &agent_jars).await?;

        for dir in [&apps, &agent_configs, &agent_jars] {
            self.transport.upload(dir).await?;
        }
        info!(
            "Uploaded {} plugins, {} agent configs and {} agent jars to {}",
            self.sources.plugins.len(),
            staged_configs.len(),
            self.sources.agent_jars.len(),
            self.transport.location()
        );

        Ok(PreparedArtifacts {
            location: self.transport.location().clone(),
            agent_configs: staged_configs,
        })
    }

    async fn stage_agent_configs(&self, configs: &[NodeConfig], dir: &Path) -> BTreeSet<String> {
        let uris: BTreeSet<&str> = configs
            .iter()
            .flat_map(|config| config.diagnostics.collectd_configs.iter())
            .map(String::as_str)
            .collect();

        let mut staged = BTreeSet::new();
        for uri in uris {
            let name = agent_config_file_name(uri);
            match self.fetcher.fetch(uri, &dir.join(&name)).await {
                Ok(()) => {
                    debug!("Staged agent config {} as {}", uri, name);
                    staged.insert(name);
                }
                Err(e) => warn!("Failed to fetch agent config {}, proceeding without it: {}", uri, e),
            }
        }
        staged
    }
}

async fn stage_files(files: &[PathBuf], dir: &Path) -> ProvisioningResult<()> {
    for file in files {
        let name = file.file_name().ok_or_else(|| {
            ProvisioningError::Configuration(format!("{} does not name a file", file.display()))
        })?;
        tokio::fs::copy(file, dir.join(name)).await.map_err(|e| {
            ProvisioningError::Io(format!("failed to stage {}: {}", file.display(), e))
        })?;
    }
    Ok(())
}
