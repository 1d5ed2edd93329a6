// Copyright (c) 2025 - Cowboy AI, Inc.
//! Results Gathering
//!
//! After a test run every node (and any other measurement source) pushes its
//! artifacts to the results transport. Fetches run concurrently on a small
//! bounded pool; a failing source is logged and does not stop the others.
//! Once every fetch has settled the results transport is downloaded into
//! the local target directory.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::errors::{ProvisioningError, ProvisioningResult};
use crate::orchestrator::Cluster;
use crate::provider::BlobTransport;
use crate::stage::timed;

/// Anything that produces measurement artifacts
#[async_trait]
pub trait MeasurementSource: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Push artifacts to the results transport
    async fn gather_results(&self) -> ProvisioningResult<()>;
}

/// Outcome of a gathering run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatheredResults {
    /// Local directory holding the downloaded results
    pub path: PathBuf,
    /// Sources whose fetch succeeded
    pub gathered: Vec<String>,
    /// Sources whose fetch failed, with the reason
    pub failed: Vec<(String, String)>,
}

/// Pulls results from many sources, at most `parallelism` at a time
pub struct ResultsGatherer {
    parallelism: usize,
}

impl ResultsGatherer {
    pub fn new(parallelism: usize) -> Self {
        Self {
            parallelism: parallelism.max(1),
        }
    }

    /// Gather from every source, then download the results transport
    ///
    /// Only the final download can fail the call.
    pub async fn gather(
        &self,
        sources: Vec<Arc<dyn MeasurementSource>>,
        transport: &dyn BlobTransport,
        target: &Path,
    ) -> ProvisioningResult<GatheredResults> {
        let permits = Arc::new(Semaphore::new(self.parallelism.min(sources.len()).max(1)));
        let mut join_set = JoinSet::new();

        info!(
            "Gathering results from {} sources, {} at a time",
            sources.len(),
            self.parallelism
        );

        for source in sources {
            let permits = permits.clone();
            join_set.spawn(async move {
                let name = source.name().to_string();
                let outcome = match permits.acquire_owned().await {
                    Ok(_permit) => {
                        timed(&format!("gather results from {}", name), source.gather_results())
                            .await
                    }
                    Err(_) => Err(ProvisioningError::Cancelled(name.clone())),
                };
                (name, outcome)
            });
        }

        let mut gathered = Vec::new();
        let mut failed = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, Ok(()))) => gathered.push(name),
                Ok((name, Err(e))) => {
                    warn!("Failed to gather results from {}. Proceeding...: {}", name, e);
                    failed.push((name, e.to_string()));
                }
                Err(e) => {
                    error!("Results task failed. Proceeding...: {}", e);
                    failed.push(("unknown".to_string(), e.to_string()));
                }
            }
        }
        gathered.sort();

        let path = timed("download results", transport.download(target)).await?;
        Ok(GatheredResults {
            path,
            gathered,
            failed,
        })
    }
}

/// Gather results from every node of `cluster` plus `extra` sources
pub async fn gather_results(
    cluster: &Cluster,
    extra: Vec<Arc<dyn MeasurementSource>>,
    transport: &dyn BlobTransport,
    target: &Path,
    parallelism: usize,
) -> ProvisioningResult<GatheredResults> {
    let mut sources = cluster.measurement_sources();
    sources.extend(extra);
    ResultsGatherer::new(parallelism)
        .gather(sources, transport, target)
        .await
}
