// Copyright (c) 2025 - Cowboy AI, Inc.
//! Orchestrator configuration
//!
//! Timeouts, pool sizes and retry policies are independently configurable.
//! [`OrchestratorConfig::default`] matches what a two-node performance test
//! cluster needs; [`OrchestratorConfig::from_env`] overrides individual
//! values from `CLUSTER_*` environment variables.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{ProvisioningError, ProvisioningResult};
use crate::remote::RetryPolicy;
use crate::stage::PoolSize;

/// Configuration of one orchestrator
///
/// Missing fields take their default when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Login user on every machine
    pub login_user: String,

    /// How long the load balancer may take to report all targets healthy
    pub health_gate_timeout: Duration,

    /// How long stack creation may be polled
    pub stack_creation_timeout: Duration,

    /// Capacity of the provisioning stage pool
    pub stage_pool: PoolSize,

    /// Upper bound of concurrent result fetches
    pub results_parallelism: usize,

    /// Retry policy for establishing remote sessions
    pub connect_retry: RetryPolicy,

    /// Retry policy for downloads on remote machines
    pub download_retry: RetryPolicy,

    /// Timeout of an ordinary remote action
    pub command_timeout: Duration,

    /// Timeout of archive listing and extraction
    pub extraction_timeout: Duration,

    /// HTTP port the application listens on
    pub application_port: u16,

    /// Availability zones never picked for the stack
    pub excluded_zones: Vec<String>,

    /// Interval between two probes of a starting node
    pub start_poll_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            login_user: "ubuntu".to_string(),
            health_gate_timeout: Duration::from_secs(5 * 60),
            stack_creation_timeout: Duration::from_secs(30 * 60),
            stage_pool: PoolSize::Cached,
            results_parallelism: 4,
            connect_retry: RetryPolicy::new(5, Duration::from_secs(5)),
            download_retry: RetryPolicy::new(3, Duration::from_secs(5)),
            command_timeout: Duration::from_secs(30),
            extraction_timeout: Duration::from_secs(60),
            application_port: 8080,
            excluded_zones: vec!["eu-central-1c".to_string()],
            start_poll_interval: Duration::from_secs(10),
        }
    }
}

impl OrchestratorConfig {
    /// Parse a JSON document; absent fields keep their defaults
    pub fn from_json(json: &str) -> ProvisioningResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ProvisioningError::Configuration(format!("invalid config: {}", e)))
    }

    /// Read a JSON config file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> ProvisioningResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ProvisioningError::Io(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> ProvisioningResult<Self> {
        let mut config = Self::default();

        if let Ok(user) = std::env::var("CLUSTER_LOGIN_USER") {
            config.login_user = user;
        }
        if let Some(secs) = parse_env::<u64>("CLUSTER_HEALTH_GATE_TIMEOUT_SECS")? {
            config.health_gate_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_env::<u64>("CLUSTER_STACK_TIMEOUT_SECS")? {
            config.stack_creation_timeout = Duration::from_secs(secs);
        }
        if let Ok(size) = std::env::var("CLUSTER_STAGE_POOL_SIZE") {
            config.stage_pool = parse_pool_size(&size)?;
        }
        if let Some(parallelism) = parse_env::<usize>("CLUSTER_RESULTS_PARALLELISM")? {
            config.results_parallelism = parallelism;
        }
        if let Some(attempts) = parse_env::<u32>("CLUSTER_DOWNLOAD_RETRY_ATTEMPTS")? {
            config.download_retry.max_attempts = attempts;
        }
        if let Some(secs) = parse_env::<u64>("CLUSTER_DOWNLOAD_RETRY_BACKOFF_SECS")? {
            config.download_retry.backoff = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn with_login_user(mut self, user: impl Into<String>) -> Self {
        self.login_user = user.into();
        self
    }

    pub fn with_health_gate_timeout(mut self, timeout: Duration) -> Self {
        self.health_gate_timeout = timeout;
        self
    }

    pub fn with_stage_pool(mut self, size: PoolSize) -> Self {
        self.stage_pool = size;
        self
    }

    pub fn with_results_parallelism(mut self, parallelism: usize) -> Self {
        self.results_parallelism = parallelism;
        self
    }

    pub fn with_download_retry(mut self, policy: RetryPolicy) -> Self {
        self.download_retry = policy;
        self
    }

    pub fn with_connect_retry(mut self, policy: RetryPolicy) -> Self {
        self.connect_retry = policy;
        self
    }

    pub fn with_start_poll_interval(mut self, interval: Duration) -> Self {
        self.start_poll_interval = interval;
        self
    }
}

fn parse_env<T: FromStr>(key: &str) -> ProvisioningResult<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            ProvisioningError::Configuration(format!("{} has an invalid value: {}", key, raw))
        }),
        Err(_) => Ok(None),
    }
}

fn parse_pool_size(raw: &str) -> ProvisioningResult<PoolSize> {
    if raw.eq_ignore_ascii_case("cached") {
        return Ok(PoolSize::Cached);
    }
    raw.trim()
        .parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
        .map(PoolSize::Fixed)
        .ok_or_else(|| {
            ProvisioningError::Configuration(format!("invalid stage pool size: {}", raw))
        })
}

/// Where the application keeps its files inside the unpacked product and
/// its home directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLayout {
    /// Properties file naming the home directory, relative to the product
    pub application_properties: String,
    /// Key of the home directory property
    pub home_property: String,
    /// Launch environment script, relative to the product
    pub launch_environment: String,
    /// Start script, relative to the product
    pub start_script: String,
    /// Stop script, relative to the product
    pub stop_script: String,
    /// Database connection descriptor, relative to the home
    pub database_config: String,
    /// Local configuration properties, relative to the home
    pub local_properties: String,
    /// Cluster properties, relative to the home
    pub cluster_properties: String,
    /// Installed plugins directory, relative to the home
    pub plugins_dir: String,
    /// Log directory, relative to the home
    pub log_dir: String,
    /// Server and GC log directory, relative to the product
    pub product_log_dir: String,
    /// Driver jar directory, relative to the product
    pub lib_dir: String,
    /// Status endpoint probed while starting
    pub status_path: String,
}

impl Default for ProductLayout {
    fn default() -> Self {
        Self {
            application_properties: "atlassian-jira/WEB-INF/classes/jira-application.properties"
                .to_string(),
            home_property: "jira.home".to_string(),
            launch_environment: "bin/setenv.sh".to_string(),
            start_script: "bin/start-jira.sh".to_string(),
            stop_script: "bin/stop-jira.sh".to_string(),
            database_config: "dbconfig.xml".to_string(),
            local_properties: "jira-config.properties".to_string(),
            cluster_properties: "cluster.properties".to_string(),
            plugins_dir: "plugins/installed-plugins".to_string(),
            log_dir: "log".to_string(),
            product_log_dir: "logs".to_string(),
            lib_dir: "lib".to_string(),
            status_path: "status".to_string(),
        }
    }
}
