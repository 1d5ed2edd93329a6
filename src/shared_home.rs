// Copyright (c) 2025 - Cowboy AI, Inc.
//! Shared Home
//!
//! In a data-center cluster one machine serves the shareable part of the
//! application home over NFS. The formula downloads the home there, copies
//! the shareable sub-directories into the shared directory, installs the
//! staged plugins and exports it. Every node later mounts the export at the
//! same path.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::artifacts::{PreparedArtifacts, APPS_DIR};
use crate::domain::{Machine, RemoteLocation, RemoteTarget, SshKey};
use crate::errors::ProvisioningResult;
use crate::provider::HomeSource;
use crate::remote::{with_session, RemoteAction, RemoteExecutor, RemoteSession, RetryPolicy};

const STAGING_DIR: &str = "/tmp/jira-shared-storage";

/// Sub-directories of the home that all nodes share
pub const SHAREABLE_DIRS: [&str; 5] = ["data", "plugins", "import", "export", "logos"];

/// An exported shared home
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedHome {
    /// Private address of the NFS server
    pub server: String,
    /// Exported directory, also used as mount point on the nodes
    pub path: String,
    /// Login to the server
    pub host: RemoteTarget,
}

impl SharedHome {
    pub fn location(&self) -> RemoteLocation {
        RemoteLocation::new(self.host.clone(), self.path.clone())
    }
}

/// Builds the shared home on its machine
pub struct SharedHomeFormula {
    executor: Arc<dyn RemoteExecutor>,
    home: Arc<dyn HomeSource>,
    connect_retry: RetryPolicy,
    command_timeout: Duration,
}

impl SharedHomeFormula {
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        home: Arc<dyn HomeSource>,
        connect_retry: RetryPolicy,
        command_timeout: Duration,
    ) -> Self {
        Self {
            executor,
            home,
            connect_retry,
            command_timeout,
        }
    }

    /// Directory exported by the shared home machine
    pub fn shared_path(login_user: &str) -> String {
        format!("/home/{}/jira-shared-home", login_user)
    }

    pub async fn provision(
        &self,
        machine: &Machine,
        key: &SshKey,
        login_user: &str,
        artifacts: &PreparedArtifacts,
    ) -> ProvisioningResult<SharedHome> {
        let target = key.target(machine.public_address.to_string(), login_user);
        let path = Self::shared_path(login_user);
        let shared = &path;

        with_session(
            self.executor.as_ref(),
            &target,
            &self.connect_retry,
            move |session| async move { self.export(session.as_ref(), shared, artifacts).await },
        )
        .await?;

        info!("Shared home exported at {}:{}", machine.private_address, path);
        Ok(SharedHome {
            server: machine.private_address.to_string(),
            path,
            host: target,
        })
    }

    async fn export(
        &self,
        session: &dyn RemoteSession,
        shared: &str,
        artifacts: &PreparedArtifacts,
    ) -> ProvisioningResult<()> {
        let home = self.home.download(session).await?;
        session
            .run(
                &RemoteAction::MakeDirectory {
                    path: shared.to_string(),
                },
                self.command_timeout,
            )
            .await?;

        for dir in SHAREABLE_DIRS {
            let copy = RemoteAction::Copy {
                source: format!("{}/{}", home, dir),
                destination: shared.to_string(),
            };
            let output = session.execute(&copy, self.command_timeout).await?;
            if !output.is_success() {
                warn!("Home has no shareable '{}' directory: {}", dir, output.stderr);
            }
        }

        self.install_plugins(session, shared, artifacts).await?;

        session
            .run(
                &RemoteAction::InstallPackages {
                    packages: vec!["nfs-kernel-server".to_string()],
                },
                self.command_timeout,
            )
            .await?;
        session
            .run(
                &RemoteAction::ExportNfs {
                    path: shared.to_string(),
                },
                self.command_timeout,
            )
            .await?;
        Ok(())
    }

    /// Sync staged plugins into the shared plugin directory
    async fn install_plugins(
        &self,
        session: &dyn RemoteSession,
        shared: &str,
        artifacts: &PreparedArtifacts,
    ) -> ProvisioningResult<()> {
        let plugins = format!("{}/plugins/installed-plugins", shared);
        let steps = [
            RemoteAction::MakeDirectory {
                path: STAGING_DIR.to_string(),
            },
            RemoteAction::MakeDirectory {
                path: plugins.clone(),
            },
            RemoteAction::InstallPackages {
                packages: vec!["awscli".to_string()],
            },
            RemoteAction::SyncFromStorage {
                location: artifacts.location.clone(),
                destination: STAGING_DIR.to_string(),
            },
        ];
        for step in &steps {
            session.run(step, self.command_timeout).await?;
        }

        let moved = session
            .execute(
                &RemoteAction::MoveContents {
                    source: format!("{}/{}", STAGING_DIR, APPS_DIR),
                    destination: plugins,
                },
                self.command_timeout,
            )
            .await?;
        if !moved.is_success() {
            warn!("No plugins moved into the shared home: {}", moved.stderr);
        }
        Ok(())
    }
}
