// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stopped and started application nodes
//!
//! ```text
//! StoppedNode ──start()──► StartedNode ──stop()──► (torn down)
//! ```
//!
//! Neither value owns a live connection. Every operation opens its own
//! session through [`NodeAccess`].

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::ProductLayout;
use crate::domain::{LaunchTimeouts, RemoteLocation, RemoteTarget};
use crate::errors::{ProvisioningError, ProvisioningResult};
use crate::provider::{BlobTransport, OsMetrics, StorageLocation};
use crate::remote::{with_session, RemoteAction, RemoteExecutor, RemoteSession, RetryPolicy};
use crate::results::MeasurementSource;

/// How to reach one node
#[derive(Clone)]
pub struct NodeAccess {
    executor: Arc<dyn RemoteExecutor>,
    pub target: RemoteTarget,
    pub connect_retry: RetryPolicy,
    /// Timeout of ordinary actions
    pub command_timeout: Duration,
    /// Timeout of archive handling and storage syncs
    pub long_timeout: Duration,
}

impl NodeAccess {
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        target: RemoteTarget,
        connect_retry: RetryPolicy,
        command_timeout: Duration,
        long_timeout: Duration,
    ) -> Self {
        Self {
            executor,
            target,
            connect_retry,
            command_timeout,
            long_timeout,
        }
    }

    /// Run `body` on a fresh session to the node
    pub async fn session<T, F, Fut>(&self, body: F) -> ProvisioningResult<T>
    where
        F: FnOnce(Arc<dyn RemoteSession>) -> Fut,
        Fut: Future<Output = ProvisioningResult<T>>,
    {
        with_session(self.executor.as_ref(), &self.target, &self.connect_retry, body).await
    }
}

impl fmt::Debug for NodeAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeAccess")
            .field("target", &self.target)
            .finish()
    }
}

/// A node whose software is installed and configured but not running
#[derive(Clone)]
pub struct StoppedNode {
    pub name: String,
    pub access: NodeAccess,
    /// Path of the application home
    pub home: String,
    /// Path of the unpacked product
    pub product: String,
    pub os_metrics: OsMetrics,
    pub launch_timeouts: LaunchTimeouts,
    pub java_home: String,
    pub jmx_port: Option<u16>,
    pub(crate) port: u16,
    pub(crate) poll_interval: Duration,
    pub(crate) layout: Arc<ProductLayout>,
    pub(crate) results: Arc<dyn BlobTransport>,
}

impl StoppedNode {
    /// Start the application and wait until it answers
    ///
    /// The node has `launch_timeouts.total()` to answer its status probe.
    /// On failure its logs are pushed to the results transport before the
    /// error is returned.
    pub async fn start(self) -> ProvisioningResult<StartedNode> {
        info!("Starting {}...", self.name);
        let started = Instant::now();
        let node = &self;

        let outcome = self
            .access
            .session(move |session| async move { node.launch(session.as_ref()).await })
            .await;

        if let Err(e) = outcome {
            warn!("{} failed to start after {:?}: {}", self.name, started.elapsed(), e);
            push_logs(&self.access, &self.results, &self.name, &self.log_dirs()).await;
            return Err(e);
        }

        info!("{} started in {:?}", self.name, started.elapsed());
        Ok(StartedNode {
            name: self.name,
            access: self.access,
            home: self.home,
            product: self.product,
            os_metrics: self.os_metrics,
            jmx_port: self.jmx_port,
            layout: self.layout,
            results: self.results,
        })
    }

    async fn launch(&self, session: &dyn RemoteSession) -> ProvisioningResult<()> {
        let start = RemoteAction::RunScript {
            script: format!("{}/{}", self.product, self.layout.start_script),
            args: Vec::new(),
            environment: vec![("JAVA_HOME".to_string(), self.java_home.clone())],
        };
        session.run(&start, self.access.command_timeout).await?;

        let url = format!("http://localhost:{}/{}", self.port, self.layout.status_path);
        let probe = RemoteAction::HttpProbe { url: url.clone() };
        let deadline = self.launch_timeouts.total();
        let waiting = async {
            loop {
                match session.execute(&probe, self.access.command_timeout).await {
                    Ok(output) if output.is_success() => return,
                    _ => tokio::time::sleep(self.poll_interval).await,
                }
            }
        };

        tokio::time::timeout(deadline, waiting).await.map_err(|_| {
            ProvisioningError::Provisioning(format!(
                "{} did not answer {} within {:?}",
                self.name, url, deadline
            ))
        })
    }

    fn log_dirs(&self) -> Vec<String> {
        log_dirs(&self.home, &self.product, &self.layout)
    }
}

impl fmt::Debug for StoppedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoppedNode")
            .field("name", &self.name)
            .field("target", &self.access.target)
            .field("home", &self.home)
            .field("product", &self.product)
            .finish()
    }
}

/// A running application node
#[derive(Clone)]
pub struct StartedNode {
    pub name: String,
    pub access: NodeAccess,
    pub home: String,
    pub product: String,
    pub os_metrics: OsMetrics,
    pub jmx_port: Option<u16>,
    layout: Arc<ProductLayout>,
    results: Arc<dyn BlobTransport>,
}

impl StartedNode {
    pub fn home_location(&self) -> RemoteLocation {
        RemoteLocation::new(self.access.target.clone(), self.home.clone())
    }

    /// Run the stop script
    pub async fn stop(&self) -> ProvisioningResult<()> {
        let stop = RemoteAction::RunScript {
            script: format!("{}/{}", self.product, self.layout.stop_script),
            args: Vec::new(),
            environment: Vec::new(),
        };
        let timeout = self.access.long_timeout;
        self.access
            .session(move |session| async move { session.run(&stop, timeout).await.map(|_| ()) })
            .await?;
        info!("{} stopped", self.name);
        Ok(())
    }
}

impl fmt::Debug for StartedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartedNode")
            .field("name", &self.name)
            .field("target", &self.access.target)
            .field("home", &self.home)
            .finish()
    }
}

#[async_trait]
impl MeasurementSource for StartedNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn gather_results(&self) -> ProvisioningResult<()> {
        let location = self.results.location().child(&self.name);
        let dirs = log_dirs(&self.home, &self.product, &self.layout);
        let timeout = self.access.long_timeout;
        let (dirs, location) = (&dirs, &location);
        self.access
            .session(move |session| async move {
                upload_logs(session.as_ref(), dirs, location, timeout).await
            })
            .await
    }
}

fn log_dirs(home: &str, product: &str, layout: &ProductLayout) -> Vec<String> {
    vec![
        format!("{}/{}", home, layout.log_dir),
        format!("{}/{}", product, layout.product_log_dir),
    ]
}

async fn upload_logs(
    session: &dyn RemoteSession,
    dirs: &[String],
    location: &StorageLocation,
    timeout: Duration,
) -> ProvisioningResult<()> {
    for dir in dirs {
        let name = dir.rsplit('/').next().unwrap_or(dir.as_str());
        let upload = RemoteAction::SyncToStorage {
            source: dir.clone(),
            location: location.child(name),
        };
        session.run(&upload, timeout).await?;
    }
    Ok(())
}

/// Best-effort upload of the logs of a node that failed to start
async fn push_logs(
    access: &NodeAccess,
    results: &Arc<dyn BlobTransport>,
    name: &str,
    dirs: &[String],
) {
    let location = results.location().child(name).child("failed-start");
    let timeout = access.long_timeout;
    let target = &location;
    let pushed = access
        .session(move |session| async move {
            upload_logs(session.as_ref(), dirs, target, timeout).await
        })
        .await;
    match pushed {
        Ok(()) => info!("Pushed logs of {} to {}", name, location),
        Err(e) => warn!("Could not push logs of {}: {}", name, e),
    }
}
