//! Error types for cluster provisioning

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while provisioning, starting or releasing a cluster
///
/// The type is `Clone` so a failed stage outcome can be observed by every
/// stage that awaits it.
#[derive(Debug, Clone, Error)]
pub enum ProvisioningError {
    /// Role cardinality mismatch, missing parameter or invalid input
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An external provisioning call failed
    #[error("Provisioning error: {0}")]
    Provisioning(String),

    /// A remote operation failed in a way that is worth retrying
    #[error("Transient remote error: {0}")]
    TransientRemote(String),

    /// A remote action exited with a non-zero status
    #[error("Remote action `{action}` on {host} exited with status {status}: {stderr}")]
    RemoteCommand {
        host: String,
        action: String,
        status: i32,
        stderr: String,
    },

    /// A remote action did not finish in time
    #[error("Remote action `{action}` on {host} timed out after {timeout:?}")]
    RemoteTimeout {
        host: String,
        action: String,
        timeout: Duration,
    },

    /// The load balancer never reported all targets healthy
    #[error("Load balancer did not become healthy within {timeout:?}")]
    HealthGateTimeout { timeout: Duration },

    /// Failure of a named stage, with the time it ran before failing
    #[error("Stage '{stage}' failed after {elapsed:?}: {source}")]
    Stage {
        stage: String,
        elapsed: Duration,
        #[source]
        source: Box<ProvisioningError>,
    },

    /// The stage was interrupted by a pool shutdown
    #[error("Stage '{0}' was cancelled")]
    Cancelled(String),

    /// Releasing a resource failed
    #[error("Resource release failed: {0}")]
    Release(String),

    /// Local filesystem error
    #[error("I/O error: {0}")]
    Io(String),
}

/// Root classification of a [`ProvisioningError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Provisioning,
    TransientRemote,
    HealthGateTimeout,
    Cancelled,
    Release,
}

impl ProvisioningError {
    /// Wrap an error with the stage it surfaced in
    pub fn in_stage(self, stage: impl Into<String>, elapsed: Duration) -> Self {
        ProvisioningError::Stage {
            stage: stage.into(),
            elapsed,
            source: Box::new(self),
        }
    }

    /// The innermost error beneath any stage wrappers
    pub fn root(&self) -> &ProvisioningError {
        let mut current = self;
        while let ProvisioningError::Stage { source, .. } = current {
            current = source;
        }
        current
    }

    /// Classify the root cause
    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            ProvisioningError::Configuration(_) => ErrorKind::Configuration,
            ProvisioningError::TransientRemote(_) => ErrorKind::TransientRemote,
            ProvisioningError::HealthGateTimeout { .. } => ErrorKind::HealthGateTimeout,
            ProvisioningError::Cancelled(_) => ErrorKind::Cancelled,
            ProvisioningError::Release(_) => ErrorKind::Release,
            ProvisioningError::Provisioning(_)
            | ProvisioningError::RemoteCommand { .. }
            | ProvisioningError::RemoteTimeout { .. }
            | ProvisioningError::Io(_)
            | ProvisioningError::Stage { .. } => ErrorKind::Provisioning,
        }
    }

    /// Whether a local retry may succeed
    ///
    /// A timed out action is retryable but, unless a retry policy picks it
    /// up, surfaces as [`ErrorKind::Provisioning`].
    pub fn is_transient(&self) -> bool {
        matches!(
            self.root(),
            ProvisioningError::TransientRemote(_) | ProvisioningError::RemoteTimeout { .. }
        )
    }

    /// Reclassify a failed remote action as worth retrying
    ///
    /// Used for actions such as downloads where a non-zero exit usually
    /// means an interrupted transfer.
    pub fn into_transient(self) -> Self {
        match self {
            ProvisioningError::RemoteCommand { .. } => {
                ProvisioningError::TransientRemote(self.to_string())
            }
            other => other,
        }
    }

    /// Name of the outermost stage, if the error passed through one
    pub fn stage(&self) -> Option<&str> {
        match self {
            ProvisioningError::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

/// Result type for provisioning operations
pub type ProvisioningResult<T> = Result<T, ProvisioningError>;

impl From<std::io::Error> for ProvisioningError {
    fn from(err: std::io::Error) -> Self {
        ProvisioningError::Io(err.to_string())
    }
}

impl From<regex::Error> for ProvisioningError {
    fn from(err: regex::Error) -> Self {
        ProvisioningError::Configuration(err.to_string())
    }
}
