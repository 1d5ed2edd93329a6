// Copyright (c) 2025 - Cowboy AI, Inc.
//! Investment - why and for how long cloud resources may exist

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Purpose and lifespan of a provisioned resource
///
/// The resource layer tags everything it creates with these values so that
/// abandoned resources can be expired automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Investment {
    pub use_case: String,
    pub lifespan: Duration,
}

impl Investment {
    pub fn new(use_case: impl Into<String>, lifespan: Duration) -> Self {
        Self {
            use_case: use_case.into(),
            lifespan,
        }
    }

    /// Moment after which the resources may be reclaimed
    pub fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.lifespan)
            .ok()
            .and_then(|lifespan| now.checked_add_signed(lifespan))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Tags attached to provisioned resources
    pub fn tags(&self, now: DateTime<Utc>) -> Vec<(String, String)> {
        vec![
            ("use_case".to_string(), self.use_case.clone()),
            ("lifespan".to_string(), self.lifespan.as_secs().to_string()),
            ("expiry".to_string(), self.expiry_from(now).to_rfc3339()),
        ]
    }
}
