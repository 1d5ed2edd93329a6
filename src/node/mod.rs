// Copyright (c) 2025 - Cowboy AI, Inc.
//! Node Provisioning
//!
//! Turns one machine plus its [`NodeConfig`] into a [`StoppedNode`].
//!
//! # Sequence
//!
//! ```text
//! connect ─► host setup ─► archive + home ─► dbconfig rewrite ─► extract
//!         ─► launch environment ─► home properties ─► database driver
//!         ─► plugins ─► monitoring agent ─► JDK ─► OS metrics ─► log forwarding
//!         ─► [data center] mount shared home, cluster.properties
//! ```
//!
//! Every step is fatal to this node only. Sibling nodes provisioning in
//! other stages are unaffected; the orchestrator decides what a failed node
//! means for the cluster.
//!
//! # Roles
//!
//! A node is either [`NodeRole::Standalone`] or [`NodeRole::DataCenter`]. The
//! data-center variant runs the standalone sequence and then applies
//! [`decorate_data_center`].

pub mod dbconfig;
pub mod setenv;
pub mod stopped;

pub use dbconfig::rewrite_database_url;
pub use setenv::LaunchEnvironment;
pub use stopped::{NodeAccess, StartedNode, StoppedNode};

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::artifacts::{
    agent_config_file_name, PreparedArtifacts, AGENT_CONFIGS_DIR, AGENT_JARS_DIR, APPS_DIR,
};
use crate::config::{OrchestratorConfig, ProductLayout};
use crate::domain::{NodeConfig, SshKey};
use crate::errors::{ProvisioningError, ProvisioningResult};
use crate::provider::{
    ApplicationArchive, BlobTransport, DiagnosticAgent, HomeSource, HostSetup, OsMetrics,
    OsMetricsProbe, RuntimeInstaller,
};
use crate::remote::{retry, RemoteAction, RemoteExecutor, RemoteSession};
use crate::shared_home::SharedHome;
use crate::stage::timed;
use crate::topology::NodeBinding;

/// Where plugins and agent artifacts are synced to on every node
pub const STORAGE_DIR: &str = "/tmp/jira-storage";

/// Where the monitoring agent reads its configs
pub const AGENT_CONFIG_TARGET: &str = "/etc/collectd/collectd.conf.d";
const AGENT_JAR_TARGET: &str = "/usr/share/collectd/java";
const AGENT_SERVICE: &str = "collectd.service";
const JMX_PLACEHOLDER: &str = "localhost:3333";

const MYSQL_CONNECTOR: &str = "mysql-connector-java-5.1.40";
const MYSQL_CONNECTOR_URL: &str =
    "https://dev.mysql.com/get/Downloads/Connector-J/mysql-connector-java-5.1.40.tar.gz";

/// External installers a node provisioner sequences
#[derive(Clone)]
pub struct HostToolkit {
    pub executor: Arc<dyn RemoteExecutor>,
    pub host: Arc<dyn HostSetup>,
    pub archive: Arc<dyn ApplicationArchive>,
    pub home: Arc<dyn HomeSource>,
    pub runtime: Arc<dyn RuntimeInstaller>,
    pub metrics: Arc<dyn OsMetricsProbe>,
    pub log_forwarder: Arc<dyn DiagnosticAgent>,
}

/// JDBC driver installed into the product
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DatabaseDriver {
    /// MySQL Connector/J from the vendor's download site
    #[default]
    MySql,
    /// A single driver jar for a managed relational database
    Managed { jar_url: String },
}

/// Role-specific inputs of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRole {
    /// The only node, with a private home
    Standalone,
    /// One of several nodes behind a load balancer
    DataCenter {
        node_index: usize,
        shared_home: SharedHome,
    },
}

/// Everything one node stage needs to know about its node
#[derive(Debug, Clone)]
pub struct NodeAssignment {
    pub binding: NodeBinding,
    pub key: SshKey,
    /// Private address of the database machine
    pub database: String,
    pub role: NodeRole,
}

/// Paths discovered while installing
struct Installed {
    home: String,
    product: String,
    os_metrics: OsMetrics,
}

/// Installs and configures the application on one machine
pub struct NodeProvisioner {
    toolkit: HostToolkit,
    config: Arc<OrchestratorConfig>,
    layout: Arc<ProductLayout>,
    driver: DatabaseDriver,
    results: Arc<dyn BlobTransport>,
}

impl NodeProvisioner {
    pub fn new(
        toolkit: HostToolkit,
        config: Arc<OrchestratorConfig>,
        layout: Arc<ProductLayout>,
        driver: DatabaseDriver,
        results: Arc<dyn BlobTransport>,
    ) -> Self {
        Self {
            toolkit,
            config,
            layout,
            driver,
            results,
        }
    }

    fn access(&self, assignment: &NodeAssignment) -> NodeAccess {
        let target = assignment.key.target(
            assignment.binding.machine.public_address.to_string(),
            self.config.login_user.clone(),
        );
        NodeAccess::new(
            self.toolkit.executor.clone(),
            target,
            self.config.connect_retry,
            self.config.command_timeout,
            self.config.extraction_timeout,
        )
    }

    /// Install the node and return it stopped
    pub async fn provision(
        &self,
        assignment: NodeAssignment,
        artifacts: &PreparedArtifacts,
    ) -> ProvisioningResult<StoppedNode> {
        let config = &assignment.binding.config;
        info!("Setting up {}...", config.name);
        let access = self.access(&assignment);

        let assigned = &assignment;
        let installed = access
            .session(move |session| async move {
                let session = session.as_ref();
                let installed = self.install(session, assigned, artifacts).await?;
                if let NodeRole::DataCenter {
                    node_index,
                    shared_home,
                } = &assigned.role
                {
                    decorate_data_center(
                        session,
                        &self.layout,
                        &installed.home,
                        *node_index,
                        shared_home,
                        self.config.command_timeout,
                    )
                    .await?;
                }
                Ok(installed)
            })
            .await?;

        info!("{} is set up", config.name);
        Ok(StoppedNode {
            name: config.name.clone(),
            access,
            home: installed.home,
            product: installed.product,
            os_metrics: installed.os_metrics,
            launch_timeouts: config.launch_timeouts,
            java_home: self.toolkit.runtime.home().to_string(),
            jmx_port: config.diagnostics.remote_jmx_port,
            port: self.config.application_port,
            poll_interval: self.config.start_poll_interval,
            layout: self.layout.clone(),
            results: self.results.clone(),
        })
    }

    async fn install(
        &self,
        session: &dyn RemoteSession,
        assignment: &NodeAssignment,
        artifacts: &PreparedArtifacts,
    ) -> ProvisioningResult<Installed> {
        let config = &assignment.binding.config;
        let toolkit = &self.toolkit;

        toolkit.host.setup(session).await?;
        let archive = toolkit.archive.download(session, ".").await?;
        let home = timed("download home", toolkit.home.download(session)).await?;
        let product = self.unpacked_product(session, &archive).await?;

        self.point_at_database(session, &home, &assignment.database)
            .await?;
        self.run_long(
            session,
            RemoteAction::Extract {
                archive: archive.clone(),
                destination: ".".to_string(),
            },
        )
        .await?;
        self.write_launch_environment(session, config, &product, assignment)
            .await?;
        self.write_home_properties(session, &home, &product).await?;
        self.install_driver(session, &product).await?;

        self.sync_storage(session, artifacts).await?;
        self.install_plugins(session, &home).await?;
        self.configure_agent(session, config, artifacts).await?;

        toolkit.runtime.install(session).await?;
        let os_metrics = toolkit.metrics.capture(session).await?;
        if config.diagnostics.log_forwarding {
            let log_dir = format!("{}/{}", home, self.layout.log_dir);
            toolkit
                .log_forwarder
                .install(session, &config.name, &log_dir)
                .await?;
        }

        Ok(Installed {
            home,
            product,
            os_metrics,
        })
    }

    async fn run(
        &self,
        session: &dyn RemoteSession,
        action: RemoteAction,
    ) -> ProvisioningResult<String> {
        let output = session.run(&action, self.config.command_timeout).await?;
        Ok(output.stdout)
    }

    async fn run_long(
        &self,
        session: &dyn RemoteSession,
        action: RemoteAction,
    ) -> ProvisioningResult<String> {
        let output = session.run(&action, self.config.extraction_timeout).await?;
        Ok(output.stdout)
    }

    /// Download with the download retry policy
    async fn download(
        &self,
        session: &dyn RemoteSession,
        url: &str,
        destination: &str,
    ) -> ProvisioningResult<()> {
        let action = &RemoteAction::Download {
            url: url.to_string(),
            destination: destination.to_string(),
        };
        let timeout = self.config.command_timeout;
        retry(&self.config.download_retry, &format!("download {}", url), move || async move {
            session
                .run(action, timeout)
                .await
                .map(|_| ())
                .map_err(ProvisioningError::into_transient)
        })
        .await
    }

    /// Product directory: first path segment of the first archive entry
    async fn unpacked_product(
        &self,
        session: &dyn RemoteSession,
        archive: &str,
    ) -> ProvisioningResult<String> {
        let listing = self
            .run_long(
                session,
                RemoteAction::ListArchive {
                    archive: archive.to_string(),
                },
            )
            .await?;
        listing
            .lines()
            .next()
            .and_then(|entry| entry.split('/').next())
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ProvisioningError::Provisioning(format!("archive {} is empty", archive)))
    }

    async fn point_at_database(
        &self,
        session: &dyn RemoteSession,
        home: &str,
        database: &str,
    ) -> ProvisioningResult<()> {
        let path = format!("{}/{}", home, self.layout.database_config);
        let descriptor = self
            .run(session, RemoteAction::ReadFile { path: path.clone() })
            .await?;
        let contents = rewrite_database_url(&descriptor, database)?;
        self.run(session, RemoteAction::WriteFile { path, contents })
            .await?;
        Ok(())
    }

    async fn write_launch_environment(
        &self,
        session: &dyn RemoteSession,
        config: &NodeConfig,
        product: &str,
        assignment: &NodeAssignment,
    ) -> ProvisioningResult<()> {
        let path = format!("{}/{}", product, self.layout.launch_environment);
        let gc_log = format!(
            "{}/{}/atlassian-jira-gc-%t.log",
            product, self.layout.product_log_dir
        );
        let environment = LaunchEnvironment::for_node(
            config,
            &gc_log,
            &assignment.binding.machine.private_address.to_string(),
        );
        let script = self
            .run(session, RemoteAction::ReadFile { path: path.clone() })
            .await?;
        self.run(
            session,
            RemoteAction::WriteFile {
                path,
                contents: environment.apply(&script),
            },
        )
        .await?;
        Ok(())
    }

    async fn write_home_properties(
        &self,
        session: &dyn RemoteSession,
        home: &str,
        product: &str,
    ) -> ProvisioningResult<()> {
        let resolved = self
            .run(
                session,
                RemoteAction::ResolvePath {
                    path: home.to_string(),
                },
            )
            .await?;
        self.run(
            session,
            RemoteAction::WriteFile {
                path: format!("{}/{}", product, self.layout.application_properties),
                contents: format!("{}={}\n", self.layout.home_property, resolved.trim()),
            },
        )
        .await?;
        self.run(
            session,
            RemoteAction::WriteFile {
                path: format!("{}/{}", home, self.layout.local_properties),
                contents: "jira.autoexport=false\n".to_string(),
            },
        )
        .await?;
        Ok(())
    }

    async fn install_driver(&self, session: &dyn RemoteSession, product: &str) -> ProvisioningResult<()> {
        let lib = format!("{}/{}", product, self.layout.lib_dir);
        match &self.driver {
            DatabaseDriver::MySql => {
                let archive = format!("{}.tar.gz", MYSQL_CONNECTOR);
                self.download(session, MYSQL_CONNECTOR_URL, &archive).await?;
                self.run_long(
                    session,
                    RemoteAction::Extract {
                        archive,
                        destination: ".".to_string(),
                    },
                )
                .await?;
                self.run(
                    session,
                    RemoteAction::Copy {
                        source: format!("{0}/{0}-bin.jar", MYSQL_CONNECTOR),
                        destination: lib,
                    },
                )
                .await?;
            }
            DatabaseDriver::Managed { jar_url } => {
                let file = jar_url
                    .rsplit('/')
                    .next()
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| {
                        ProvisioningError::Configuration(format!(
                            "driver URL {} does not name a file",
                            jar_url
                        ))
                    })?;
                self.download(session, jar_url, &format!("{}/{}", lib, file))
                    .await?;
            }
        }
        debug!("Installed {:?} driver into {}", self.driver, product);
        Ok(())
    }

    async fn sync_storage(
        &self,
        session: &dyn RemoteSession,
        artifacts: &PreparedArtifacts,
    ) -> ProvisioningResult<()> {
        self.run(
            session,
            RemoteAction::MakeDirectory {
                path: STORAGE_DIR.to_string(),
            },
        )
        .await?;
        self.run(
            session,
            RemoteAction::InstallPackages {
                packages: vec!["awscli".to_string()],
            },
        )
        .await?;
        self.run_long(
            session,
            RemoteAction::SyncFromStorage {
                location: artifacts.location.clone(),
                destination: STORAGE_DIR.to_string(),
            },
        )
        .await?;
        Ok(())
    }

    /// Move synced plugins into the home; an empty plugin set is fine
    async fn install_plugins(&self, session: &dyn RemoteSession, home: &str) -> ProvisioningResult<()> {
        let target = format!("{}/{}", home, self.layout.plugins_dir);
        self.run(
            session,
            RemoteAction::MakeDirectory {
                path: target.clone(),
            },
        )
        .await?;
        let moved = session
            .execute(
                &RemoteAction::MoveContents {
                    source: format!("{}/{}", STORAGE_DIR, APPS_DIR),
                    destination: target,
                },
                self.config.command_timeout,
            )
            .await?;
        if !moved.is_success() {
            debug!("No plugins to install: {}", moved.stderr);
        }
        Ok(())
    }

    async fn configure_agent(
        &self,
        session: &dyn RemoteSession,
        config: &NodeConfig,
        artifacts: &PreparedArtifacts,
    ) -> ProvisioningResult<()> {
        self.run(
            session,
            RemoteAction::InstallPackages {
                packages: vec!["collectd".to_string()],
            },
        )
        .await?;

        for uri in &config.diagnostics.collectd_configs {
            let name = agent_config_file_name(uri);
            if !artifacts.agent_configs.contains(&name) {
                warn!("Agent config {} was not staged, skipping it", uri);
                continue;
            }
            let staged = self
                .run(
                    session,
                    RemoteAction::ReadFile {
                        path: format!("{}/{}/{}", STORAGE_DIR, AGENT_CONFIGS_DIR, name),
                    },
                )
                .await?;
            let contents = match config.diagnostics.remote_jmx_port {
                Some(port) => staged.replace(JMX_PLACEHOLDER, &format!("localhost:{}", port)),
                None => staged,
            };
            self.run(
                session,
                RemoteAction::WriteFile {
                    path: format!("{}/{}", AGENT_CONFIG_TARGET, name),
                    contents,
                }
                .privileged(),
            )
            .await?;
        }

        self.run(
            session,
            RemoteAction::MakeDirectory {
                path: AGENT_JAR_TARGET.to_string(),
            }
            .privileged(),
        )
        .await?;
        self.run(
            session,
            RemoteAction::MoveContents {
                source: format!("{}/{}", STORAGE_DIR, AGENT_JARS_DIR),
                destination: AGENT_JAR_TARGET.to_string(),
            }
            .privileged(),
        )
        .await?;
        self.run(
            session,
            RemoteAction::RestartService {
                service: AGENT_SERVICE.to_string(),
            },
        )
        .await?;
        Ok(())
    }
}

/// Data-center additions: mount the shared home and identify the node
pub async fn decorate_data_center(
    session: &dyn RemoteSession,
    layout: &ProductLayout,
    home: &str,
    node_index: usize,
    shared_home: &SharedHome,
    timeout: std::time::Duration,
) -> ProvisioningResult<()> {
    let actions = [
        RemoteAction::InstallPackages {
            packages: vec!["nfs-common".to_string()],
        },
        RemoteAction::MakeDirectory {
            path: shared_home.path.clone(),
        },
        RemoteAction::MountNfs {
            server: shared_home.server.clone(),
            export: shared_home.path.clone(),
            mount_point: shared_home.path.clone(),
        },
        RemoteAction::WriteFile {
            path: format!("{}/{}", home, layout.cluster_properties),
            contents: cluster_properties(node_index, &shared_home.path),
        },
    ];
    for action in &actions {
        session.run(action, timeout).await?;
    }
    Ok(())
}

/// Contents of `cluster.properties` for one node
pub fn cluster_properties(node_index: usize, shared_home: &str) -> String {
    format!(
        "jira.node.id = node{}\njira.shared.home = {}\n",
        node_index, shared_home
    )
}
