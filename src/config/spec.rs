//! Configuration types for the address agent.
//!
//! This module defines the structs that map to `address-agent.yaml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::address::namespaced_name;

/// Label value marking address configuration resources.
pub const ADDRESS_CONFIG_LABEL: &str = "address-config";

/// The root configuration structure of the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentConfig {
    /// Address space served by this agent.
    pub address_space: String,
    /// Namespace prefix for resource names.
    #[serde(default)]
    pub address_space_namespace: Option<String>,
    /// Address space plan used to list address types.
    #[serde(default)]
    pub address_space_plan: String,
    /// Infrastructure id isolating this tenant's resources.
    #[serde(default)]
    pub infra_uuid: Option<String>,
    /// Resource store connection.
    #[serde(default)]
    pub store: StoreConfig,
    /// Buffered notifications per subscriber.
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
}

/// Resource store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    /// Base URL of the API server.
    #[serde(default = "default_store_url")]
    pub url: String,
    /// Namespace holding the managed resources.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Bearer token.
    #[serde(default)]
    pub token: Option<String>,
    /// File to read the bearer token from when `token` is unset.
    #[serde(default)]
    pub token_file: Option<PathBuf>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Interval between full resyncs of the watched resources.
    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,
    /// Skip TLS certificate verification.
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
}

fn default_notification_capacity() -> usize {
    256
}

fn default_store_url() -> String {
    String::from("https://kubernetes.default.svc")
}

fn default_namespace() -> String {
    String::from("default")
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_resync_interval_secs() -> u64 {
    30
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            namespace: default_namespace(),
            token: None,
            token_file: None,
            timeout_secs: default_timeout_secs(),
            resync_interval_secs: default_resync_interval_secs(),
            insecure_skip_tls_verify: false,
        }
    }
}

impl AgentConfig {
    /// Creates a configuration for an address space with defaults elsewhere.
    #[must_use]
    pub fn new(address_space: impl Into<String>) -> Self {
        Self {
            address_space: address_space.into(),
            address_space_namespace: None,
            address_space_plan: String::new(),
            infra_uuid: None,
            store: StoreConfig::default(),
            notification_capacity: default_notification_capacity(),
        }
    }

    /// Returns the label selector matching this agent's address resources.
    #[must_use]
    pub fn watch_selector(&self) -> String {
        match &self.infra_uuid {
            Some(uuid) => format!("type={ADDRESS_CONFIG_LABEL},infraUuid={uuid}"),
            None => format!("type={ADDRESS_CONFIG_LABEL}"),
        }
    }

    /// Returns the stored resource name for an address document name.
    #[must_use]
    pub fn resource_name(&self, name: &str) -> String {
        namespaced_name(self.address_space_namespace.as_deref(), name)
    }
}
