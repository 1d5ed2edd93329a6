// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stage Concurrency Layer
//!
//! Provisioning is split into named stages that run concurrently on a
//! [`StagePool`]. Submitting a stage returns a [`StageFuture`]; downstream
//! stages obtain upstream values by awaiting it.
//!
//! # Scheduling
//!
//! ```text
//! submit_after(stage, inputs, work)
//!        │
//!        ├── 1. await every declared input      (no permit held)
//!        ├── 2. acquire a pool permit           (bounded pools only)
//!        ├── 3. run work(StageContext)          (inside a tracing span)
//!        └── 4. publish outcome to StageFuture  (exactly once)
//! ```
//!
//! Inputs are awaited *before* a permit is taken, so a stage waiting on an
//! upstream value never occupies pool capacity. As long as a stage body only
//! awaits inputs it declared, a bounded pool cannot deadlock: the declared
//! inputs form the acyclic [`StagePlan`].
//!
//! # Failure
//!
//! A failing stage logs its error when it fails, whether or not anything
//! ever awaits it. Awaiters receive the error wrapped with the stage name and
//! elapsed time.
//!
//! # Shutdown
//!
//! [`StagePool::shutdown_now`] refuses new work and aborts running stages at
//! their next suspension point. Remote commands already in flight are not
//! guaranteed to stop. Dropping the pool shuts it down.

pub mod plan;
pub mod timer;

pub use plan::{StageId, StagePlan};
pub use timer::timed;

use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, error, info_span, Instrument};
use uuid::Uuid;

use crate::errors::{ProvisioningError, ProvisioningResult};

/// Capacity of a stage pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PoolSize {
    /// No limit on concurrently running stages
    Cached,
    /// At most this many stages run at once
    Fixed(usize),
}

/// Explicit diagnostic context handed to every stage body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageContext {
    pub stage: String,
    pub pool: String,
    pub correlation_id: Uuid,
}

impl fmt::Display for StageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} [{}]", self.pool, self.stage, self.correlation_id)
    }
}

type SharedOutcome<T> = Shared<BoxFuture<'static, ProvisioningResult<T>>>;

/// Handle to the eventual outcome of a stage
///
/// Cloneable; every clone observes the same outcome.
pub struct StageFuture<T: Clone> {
    name: Arc<str>,
    outcome: SharedOutcome<T>,
}

impl<T: Clone> Clone for StageFuture<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            outcome: self.outcome.clone(),
        }
    }
}

impl<T> StageFuture<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// An already completed stage
    pub fn ready(name: impl Into<String>, value: T) -> Self {
        Self::from_future(name, futures::future::ready(Ok(value)))
    }

    /// An already failed stage
    pub fn failed(name: impl Into<String>, error: ProvisioningError) -> Self {
        Self::from_future(name, futures::future::ready(Err(error)))
    }

    /// Adapt an arbitrary future, e.g. credentials supplied by the caller
    pub fn from_future<F>(name: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = ProvisioningResult<T>> + Send + 'static,
    {
        let name: String = name.into();
        Self {
            name: Arc::from(name.as_str()),
            outcome: future.boxed().shared(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the stage and take a copy of its value
    pub async fn get(&self) -> ProvisioningResult<T> {
        self.outcome.clone().await
    }

    /// The outcome, if the stage has already settled
    pub fn peek(&self) -> Option<ProvisioningResult<T>> {
        self.outcome.peek().cloned()
    }
}

impl<T: Clone> fmt::Debug for StageFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageFuture").field("name", &self.name).finish()
    }
}

/// Type-erased view of a stage, used to declare inputs
pub trait Awaitable: Send + Sync {
    fn stage_name(&self) -> &str;

    /// Resolves once the stage settles, carrying only success or failure
    fn settled(&self) -> BoxFuture<'static, ProvisioningResult<()>>;
}

impl<T> Awaitable for StageFuture<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn stage_name(&self) -> &str {
        &self.name
    }

    fn settled(&self) -> BoxFuture<'static, ProvisioningResult<()>> {
        let outcome = self.outcome.clone();
        async move { outcome.await.map(|_| ()) }.boxed()
    }
}

struct TrackedStage {
    abort: AbortHandle,
    settled: Shared<BoxFuture<'static, ()>>,
}

/// Worker pool on which named stages are submitted
pub struct StagePool {
    name: String,
    correlation_id: Uuid,
    permits: Option<Arc<Semaphore>>,
    tracked: Mutex<Vec<TrackedStage>>,
    shut_down: AtomicBool,
}

impl StagePool {
    pub fn new(name: impl Into<String>, size: PoolSize) -> Self {
        let permits = match size {
            PoolSize::Cached => None,
            PoolSize::Fixed(n) => Some(Arc::new(Semaphore::new(n.max(1)))),
        };
        Self {
            name: name.into(),
            correlation_id: Uuid::now_v7(),
            permits,
            tracked: Mutex::new(Vec::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Unbounded pool for highly parallel phases
    pub fn cached(name: impl Into<String>) -> Self {
        Self::new(name, PoolSize::Cached)
    }

    /// Pool running at most `size` stages at once
    pub fn fixed(name: impl Into<String>, size: usize) -> Self {
        Self::new(name, PoolSize::Fixed(size))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Context a stage named `stage` would receive
    pub fn context(&self, stage: impl Into<String>) -> StageContext {
        StageContext {
            stage: stage.into(),
            pool: self.name.clone(),
            correlation_id: self.correlation_id,
        }
    }

    /// Submit a stage with no upstream inputs
    pub fn submit<T, F, Fut>(&self, stage: impl Into<String>, work: F) -> StageFuture<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(StageContext) -> Fut + Send + 'static,
        Fut: Future<Output = ProvisioningResult<T>> + Send + 'static,
    {
        self.submit_after(stage, &[], work)
    }

    /// Submit a stage that starts once every input has settled
    ///
    /// If an input fails, the stage does not run and fails with the input's
    /// error.
    pub fn submit_after<T, F, Fut>(
        &self,
        stage: impl Into<String>,
        inputs: &[&dyn Awaitable],
        work: F,
    ) -> StageFuture<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(StageContext) -> Fut + Send + 'static,
        Fut: Future<Output = ProvisioningResult<T>> + Send + 'static,
    {
        let stage: String = stage.into();
        if self.is_shut_down() {
            return StageFuture::failed(stage.clone(), ProvisioningError::Cancelled(stage));
        }

        let context = self.context(stage.clone());
        let barriers: Vec<(String, BoxFuture<'static, ProvisioningResult<()>>)> = inputs
            .iter()
            .map(|input| (input.stage_name().to_string(), input.settled()))
            .collect();
        let permits = self.permits.clone();
        let span = info_span!(
            "stage",
            stage = %context.stage,
            pool = %context.pool,
            correlation_id = %context.correlation_id
        );

        let task_stage = stage.clone();
        let task = async move {
            let waiting = Instant::now();
            for (input, barrier) in barriers {
                if let Err(e) = barrier.await {
                    debug!("Skipping {} because {} failed", task_stage, input);
                    return Err(e.in_stage(task_stage, waiting.elapsed()));
                }
            }
            let _permit = match permits {
                Some(semaphore) => Some(
                    semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| ProvisioningError::Cancelled(task_stage.clone()))?,
                ),
                None => None,
            };

            debug!("Stage {} started", task_stage);
            let started = Instant::now();
            let outcome = work(context).await;
            let elapsed = started.elapsed();
            match outcome {
                Ok(value) => {
                    debug!("Stage {} completed in {:?}", task_stage, elapsed);
                    Ok(value)
                }
                Err(e) => {
                    error!("Stage {} failed after {:?}: {}", task_stage, elapsed, e);
                    Err(e.in_stage(task_stage, elapsed))
                }
            }
        }
        .instrument(span);

        let handle = tokio::spawn(task);
        let abort = handle.abort_handle();
        let joined_stage = stage.clone();
        let outcome: SharedOutcome<T> = async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_cancelled() => Err(ProvisioningError::Cancelled(joined_stage)),
                Err(e) => Err(ProvisioningError::Provisioning(format!(
                    "stage '{}' panicked: {}",
                    joined_stage, e
                ))),
            }
        }
        .boxed()
        .shared();

        let settled = outcome.clone().map(|_| ()).boxed().shared();
        self.tracked.lock().push(TrackedStage { abort, settled });

        StageFuture {
            name: Arc::from(stage.as_str()),
            outcome,
        }
    }

    /// Wait until every submitted stage has settled
    pub async fn drain(&self) {
        let settled: Vec<_> = self
            .tracked
            .lock()
            .iter()
            .map(|stage| stage.settled.clone())
            .collect();
        join_all(settled).await;
    }

    /// Refuse new stages and interrupt running ones
    pub fn shutdown_now(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(permits) = &self.permits {
            permits.close();
        }
        let tracked = self.tracked.lock();
        let interrupted = tracked.iter().filter(|s| !s.abort.is_finished()).count();
        for stage in tracked.iter() {
            stage.abort.abort();
        }
        debug!(
            "Pool {} shut down, interrupted {} running stages",
            self.name, interrupted
        );
    }
}

impl Drop for StagePool {
    fn drop(&mut self) {
        self.shutdown_now();
    }
}

/// Submits stages in the order and with the inputs a [`StagePlan`] declares
pub struct PlannedStages<'a> {
    pool: &'a StagePool,
    plan: &'a StagePlan,
    submitted: HashMap<StageId, Box<dyn Awaitable>>,
}

impl<'a> PlannedStages<'a> {
    pub fn new(pool: &'a StagePool, plan: &'a StagePlan) -> Self {
        Self {
            pool,
            plan,
            submitted: HashMap::new(),
        }
    }

    pub fn pool(&self) -> &StagePool {
        self.pool
    }

    /// Submit `id` after its declared inputs
    ///
    /// Fails with a configuration error if the plan does not know the stage,
    /// it was already submitted, or an input has not been submitted yet.
    pub fn submit<T, F, Fut>(&mut self, id: StageId, work: F) -> ProvisioningResult<StageFuture<T>>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(StageContext) -> Fut + Send + 'static,
        Fut: Future<Output = ProvisioningResult<T>> + Send + 'static,
    {
        let inputs = self.resolve_inputs(id)?;
        let future = self.pool.submit_after(id.to_string(), &inputs, work);
        self.submitted.insert(id, Box::new(future.clone()));
        Ok(future)
    }

    /// Record a stage that completed outside the pool
    pub fn complete<T>(&mut self, id: StageId, value: T) -> ProvisioningResult<StageFuture<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.resolve_inputs(id)?;
        let future = StageFuture::ready(id.to_string(), value);
        self.submitted.insert(id, Box::new(future.clone()));
        Ok(future)
    }

    /// Record a stage whose future was produced elsewhere, e.g. by the caller
    pub fn adopt<T>(&mut self, id: StageId, future: StageFuture<T>) -> ProvisioningResult<StageFuture<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.resolve_inputs(id)?;
        self.submitted.insert(id, Box::new(future.clone()));
        Ok(future)
    }

    fn resolve_inputs(&self, id: StageId) -> ProvisioningResult<Vec<&dyn Awaitable>> {
        let declared = self.plan.inputs(id).ok_or_else(|| {
            ProvisioningError::Configuration(format!("stage '{}' is not part of the plan", id))
        })?;
        if self.submitted.contains_key(&id) {
            return Err(ProvisioningError::Configuration(format!(
                "stage '{}' was already submitted",
                id
            )));
        }
        declared
            .iter()
            .map(|input| {
                self.submitted
                    .get(input)
                    .map(|stage| stage.as_ref())
                    .ok_or_else(|| {
                        ProvisioningError::Configuration(format!(
                            "stage '{}' submitted before its input '{}'",
                            id, input
                        ))
                    })
            })
            .collect()
    }
}
