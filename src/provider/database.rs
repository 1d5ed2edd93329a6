// Copyright (c) 2025 - Cowboy AI, Inc.
//! Database formula contract

use async_trait::async_trait;
use url::Url;

use crate::errors::ProvisioningResult;
use crate::remote::RemoteSession;

/// Installs and starts the database on its machine
#[async_trait]
pub trait DatabaseFormula: Send + Sync {
    /// Prepare the database, returning the path of its data on the machine
    async fn setup(&self, session: &dyn RemoteSession) -> ProvisioningResult<String>;

    /// Start the database for an application reachable at `application`
    async fn start(&self, application: &Url, session: &dyn RemoteSession) -> ProvisioningResult<()>;
}
