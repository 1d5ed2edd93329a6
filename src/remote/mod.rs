// Copyright (c) 2025 - Cowboy AI, Inc.
//! Remote Execution
//!
//! The orchestrator never talks to a secure shell directly. It consumes a
//! [`RemoteExecutor`] collaborator that opens [`RemoteSession`]s to a
//! [`RemoteTarget`] and executes declarative [`RemoteAction`]s on them.
//!
//! # Scoped sessions
//!
//! [`with_session`] is the only way stages open sessions: it connects with
//! the connect retry policy, hands the session to a body and closes the
//! session when the body returns, whether it succeeded or failed.
//!
//! ```text
//! with_session(executor, target, retry, body)
//!        ├── connect (retried while transient)
//!        ├── body(session)
//!        └── close  (always, failures only logged)
//! ```

pub mod action;
pub mod retry;

pub use action::RemoteAction;
pub use retry::{retry, RetryPolicy};

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::RemoteTarget;
use crate::errors::{ProvisioningError, ProvisioningResult};

/// Outcome of one remote action
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_status: 0,
        }
    }

    pub fn failure(exit_status: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_status,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_status == 0
    }
}

/// An open connection to one machine
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Machine the session is connected to
    fn target(&self) -> &RemoteTarget;

    /// Run an action, reporting its exit status without judging it
    ///
    /// Fails only when the action could not be run or timed out.
    async fn execute(
        &self,
        action: &RemoteAction,
        timeout: Duration,
    ) -> ProvisioningResult<CommandOutput>;

    /// Run an action that must succeed
    ///
    /// A non-zero exit becomes [`ProvisioningError::RemoteCommand`], an
    /// overrun of `timeout` becomes [`ProvisioningError::RemoteTimeout`].
    async fn run(&self, action: &RemoteAction, timeout: Duration) -> ProvisioningResult<CommandOutput> {
        debug!("{}: {}", self.target(), action);
        let output = tokio::time::timeout(timeout, self.execute(action, timeout))
            .await
            .map_err(|_| ProvisioningError::RemoteTimeout {
                host: self.target().address().to_string(),
                action: action.to_string(),
                timeout,
            })??;

        if output.is_success() {
            Ok(output)
        } else {
            Err(ProvisioningError::RemoteCommand {
                host: self.target().address().to_string(),
                action: action.to_string(),
                status: output.exit_status,
                stderr: output.stderr,
            })
        }
    }

    /// Tear the connection down
    async fn close(&self) -> ProvisioningResult<()>;
}

/// Opens sessions to remote machines
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Connect to `target`
    ///
    /// Connection refusals while a machine is still booting should be
    /// reported as [`ProvisioningError::TransientRemote`].
    async fn connect(&self, target: &RemoteTarget) -> ProvisioningResult<Box<dyn RemoteSession>>;
}

/// Open a session, run `body` on it and close it on every exit path
pub async fn with_session<T, F, Fut>(
    executor: &dyn RemoteExecutor,
    target: &RemoteTarget,
    connect_retry: &RetryPolicy,
    body: F,
) -> ProvisioningResult<T>
where
    F: FnOnce(Arc<dyn RemoteSession>) -> Fut,
    Fut: Future<Output = ProvisioningResult<T>>,
{
    let label = format!("connect to {}", target);
    let session: Arc<dyn RemoteSession> =
        Arc::from(retry(connect_retry, &label, || executor.connect(target)).await?);

    let outcome = body(session.clone()).await;

    if let Err(e) = session.close().await {
        warn!("Failed to close session to {}: {}", target, e);
    }
    outcome
}
