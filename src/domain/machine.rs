// Copyright (c) 2025 - Cowboy AI, Inc.
//! Machines and Cluster Roles
//!
//! A [`Machine`] is an immutable snapshot of one compute instance in the
//! provisioned network. Its role is never stored: it is derived from the
//! instance tags through [`ClusterRole::tag`].

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;

/// Key/value tag attached to a cloud instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Snapshot of one compute instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Machine {
    pub public_address: IpAddr,
    pub private_address: IpAddr,
    pub tags: BTreeSet<Tag>,
}

impl Machine {
    pub fn new(public_address: IpAddr, private_address: IpAddr) -> Self {
        Self {
            public_address,
            private_address,
            tags: BTreeSet::new(),
        }
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.insert(tag);
        self
    }

    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }

    pub fn has_role(&self, role: ClusterRole) -> bool {
        self.has_tag(&role.tag())
    }

    /// Deterministic ordering key: private address, then public address
    pub fn ordering_key(&self) -> (IpAddr, IpAddr) {
        (self.private_address, self.public_address)
    }

    /// Compare by [`Machine::ordering_key`]
    pub fn by_address(a: &Machine, b: &Machine) -> Ordering {
        a.ordering_key().cmp(&b.ordering_key())
    }
}

/// Role a machine plays in the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusterRole {
    /// Runs one application node
    ApplicationNode,
    /// Runs the database
    Database,
    /// Serves the shared home directory over NFS
    SharedHome,
}

impl ClusterRole {
    /// Instance tag that marks a machine with this role
    pub fn tag(&self) -> Tag {
        match self {
            ClusterRole::ApplicationNode => Tag::new("jpt-jira", "true"),
            ClusterRole::Database => Tag::new("jpt-database", "true"),
            ClusterRole::SharedHome => Tag::new("jpt-shared-home", "true"),
        }
    }
}

impl fmt::Display for ClusterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterRole::ApplicationNode => write!(f, "application node"),
            ClusterRole::Database => write!(f, "database"),
            ClusterRole::SharedHome => write!(f, "shared home"),
        }
    }
}
