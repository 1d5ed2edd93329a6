// Copyright (c) 2025 - Cowboy AI, Inc.
//! Object storage transport

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::ProvisioningResult;

/// Bucket prefix and region of a storage location
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageLocation {
    pub uri: String,
    pub region: String,
}

impl StorageLocation {
    pub fn new(uri: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            region: region.into(),
        }
    }

    /// Location of a sub-prefix
    pub fn child(&self, name: &str) -> Self {
        Self {
            uri: format!("{}/{}", self.uri.trim_end_matches('/'), name),
            region: self.region.clone(),
        }
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.uri, self.region)
    }
}

/// Moves files between the orchestrating host and a storage location
#[async_trait]
pub trait BlobTransport: Send + Sync {
    fn location(&self) -> &StorageLocation;

    /// Upload a file or directory tree
    async fn upload(&self, source: &Path) -> ProvisioningResult<()>;

    /// Download everything under the location into `target`
    async fn download(&self, target: &Path) -> ProvisioningResult<PathBuf>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_location() {
        let location = StorageLocation::new("s3://results/run-7/", "us-east-1");
        let child = location.child("jira-node-1");
        assert_eq!(child.uri, "s3://results/run-7/jira-node-1");
        assert_eq!(child.region, "us-east-1");
    }
}
