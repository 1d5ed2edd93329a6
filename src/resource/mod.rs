// Copyright (c) 2025 - Cowboy AI, Inc.
//! Releasable Cloud Resources
//!
//! Everything the orchestrator creates in the cloud is represented by a
//! [`ResourceHandle`]. Handles compose into a tree where a *user* resource
//! (e.g. a load balancer) is always released before the *dependency* it runs
//! on (e.g. the network stack):
//!
//! ```text
//! compose(load balancer, network stack)
//!        │
//!        ├── 1. release load balancer   (error remembered)
//!        └── 2. release network stack   (always attempted)
//! ```
//!
//! Release is idempotent per handle: the first call performs the release,
//! every later or concurrent call observes the same outcome. A dependency
//! shared by two composites is therefore released exactly once.
//!
//! This is the only place allowed to destroy billable resources.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::errors::ProvisioningResult;

/// A provisioned cloud resource that can be deallocated
#[async_trait]
pub trait Resource: Send + Sync {
    /// Deallocate the resource
    async fn release(&self) -> ProvisioningResult<()>;
}

enum Node {
    Leaf(Arc<dyn Resource>),
    Dependent {
        user: ResourceHandle,
        dependency: ResourceHandle,
    },
    Nothing,
}

struct Inner {
    label: String,
    node: Node,
    outcome: OnceCell<ProvisioningResult<()>>,
}

/// Shareable, idempotent handle to a releasable resource tree
#[derive(Clone)]
pub struct ResourceHandle {
    inner: Arc<Inner>,
}

impl ResourceHandle {
    /// Wrap a single resource
    pub fn new(label: impl Into<String>, resource: impl Resource + 'static) -> Self {
        Self::from_arc(label, Arc::new(resource))
    }

    /// Wrap a shared resource
    pub fn from_arc(label: impl Into<String>, resource: Arc<dyn Resource>) -> Self {
        Self::with_node(label.into(), Node::Leaf(resource))
    }

    /// A handle with nothing behind it
    pub fn noop(label: impl Into<String>) -> Self {
        Self::with_node(label.into(), Node::Nothing)
    }

    /// Release `user` first, then `dependency`
    ///
    /// The dependency release is attempted even if the user release fails;
    /// the first error is the one reported.
    pub fn compose(user: ResourceHandle, dependency: ResourceHandle) -> Self {
        let label = format!("{} on {}", user.label(), dependency.label());
        Self::with_node(label, Node::Dependent { user, dependency })
    }

    fn with_node(label: String, node: Node) -> Self {
        Self {
            inner: Arc::new(Inner {
                label,
                node,
                outcome: OnceCell::new(),
            }),
        }
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Whether a release has already completed
    pub fn is_released(&self) -> bool {
        self.inner.outcome.initialized()
    }

    /// Release the resource tree, at most once
    pub fn release(&self) -> BoxFuture<'_, ProvisioningResult<()>> {
        async move {
            self.inner
                .outcome
                .get_or_init(|| self.release_once())
                .await
                .clone()
        }
        .boxed()
    }

    async fn release_once(&self) -> ProvisioningResult<()> {
        match &self.inner.node {
            Node::Nothing => Ok(()),
            Node::Leaf(resource) => {
                info!("Releasing {}", self.label());
                let outcome = resource.release().await;
                match &outcome {
                    Ok(()) => info!("Released {}", self.label()),
                    Err(e) => warn!("Failed to release {}: {}", self.label(), e),
                }
                outcome
            }
            Node::Dependent { user, dependency } => {
                let user_outcome = user.release().await;
                if user_outcome.is_err() {
                    debug!(
                        "Releasing {} despite failure releasing {}",
                        dependency.label(),
                        user.label()
                    );
                }
                let dependency_outcome = dependency.release().await;
                user_outcome.and(dependency_outcome)
            }
        }
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("label", &self.inner.label)
            .field("released", &self.is_released())
            .finish()
    }
}
