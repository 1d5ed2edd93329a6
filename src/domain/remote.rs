// Copyright (c) 2025 - Cowboy AI, Inc.
//! Remote Addressing Value Objects
//!
//! Every machine the orchestrator touches is addressed by a [`RemoteTarget`]:
//! the network address, the login identity and the private key used to
//! authenticate. Durable artifacts on those machines are described by a
//! [`RemoteLocation`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Address, login user and private key of a remote machine
///
/// Immutable once created. Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteTarget {
    address: String,
    user: String,
    private_key: PathBuf,
}

impl RemoteTarget {
    pub fn new(
        address: impl Into<String>,
        user: impl Into<String>,
        private_key: impl Into<PathBuf>,
    ) -> Self {
        Self {
            address: address.into(),
            user: user.into(),
            private_key: private_key.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn private_key(&self) -> &Path {
        &self.private_key
    }
}

impl fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.address)
    }
}

/// Where a durable artifact lives on a remote machine
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteLocation {
    pub host: RemoteTarget,
    pub path: String,
}

impl RemoteLocation {
    pub fn new(host: RemoteTarget, path: impl Into<String>) -> Self {
        Self {
            host,
            path: path.into(),
        }
    }
}

impl fmt::Display for RemoteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.path)
    }
}

/// Key pair registered with the cloud provider
///
/// `remote_name` is the provider-side key name passed to stack creation,
/// `private_key` the local file used to log into the machines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKey {
    pub remote_name: String,
    pub private_key: PathBuf,
}

impl SshKey {
    pub fn new(remote_name: impl Into<String>, private_key: impl Into<PathBuf>) -> Self {
        Self {
            remote_name: remote_name.into(),
            private_key: private_key.into(),
        }
    }

    /// Address a machine with this key
    pub fn target(&self, address: impl Into<String>, user: impl Into<String>) -> RemoteTarget {
        RemoteTarget::new(address, user, self.private_key.clone())
    }
}
