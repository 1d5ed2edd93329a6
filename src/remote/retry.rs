// Copyright (c) 2025 - Cowboy AI, Inc.
//! Bounded retry with fixed backoff

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

use crate::errors::{ProvisioningError, ProvisioningResult};

/// How often and how patiently a transient failure is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Pause between two attempts
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Try exactly once
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}

/// Run `operation` until it succeeds, fails permanently or runs out of attempts
///
/// Only errors whose [`ProvisioningError::is_transient`] holds are retried.
/// Exhausting the attempts escalates the last transient error to a
/// [`ProvisioningError::Provisioning`].
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
) -> ProvisioningResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProvisioningResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) if attempt >= max_attempts => {
                error!("{} failed after {} attempts: {}", label, attempt, e);
                return Err(ProvisioningError::Provisioning(format!(
                    "{} failed after {} attempts: {}",
                    label, attempt, e
                )));
            }
            Err(e) => {
                warn!(
                    "{} failed on attempt {}/{}, retrying in {:?}: {}",
                    label, attempt, max_attempts, policy.backoff, e
                );
                tokio::time::sleep(policy.backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_secs(5));

        let value = retry(&policy, "download", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ProvisioningError::TransientRemote("connection reset".into()))
            } else {
                Ok("archive.tar.gz")
            }
        })
        .await
        .unwrap();

        assert_eq!(value, "archive.tar.gz");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_action_is_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_secs(1));

        retry(&policy, "download", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ProvisioningError::RemoteTimeout {
                    host: "10.0.0.1".to_string(),
                    action: "wget".to_string(),
                    timeout: Duration::from_secs(30),
                })
            } else {
                Ok(())
            }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_escalate() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_secs(1));

        let error = retry(&policy, "download", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(ProvisioningError::TransientRemote("timeout".into()))
        })
        .await
        .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Provisioning);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let calls = AtomicU32::new(0);

        let error = retry(&RetryPolicy::default(), "configure", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(ProvisioningError::Configuration("bad".into()))
        })
        .await
        .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Configuration);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
