//! Resource store trait definition.
//!
//! This module defines the common interface for resource store backends.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Kinds of resources the agent reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// Per-address configuration objects.
    ConfigMap,
    /// Address plans.
    AddressPlan,
    /// Address space plans.
    AddressSpacePlan,
}

/// Location of a single named resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourcePath {
    /// Kind of the resource.
    pub kind: ResourceKind,
    /// Name of the resource.
    pub name: String,
}

/// Result of a read-modify-write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The mutated object was written back.
    Updated,
    /// The mutator reported no change; nothing was written.
    Unchanged,
}

/// Trait for resource store backends.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Lists all resources of a kind, optionally filtered by a label selector
    /// of the form `key=value[,key=value...]`.
    async fn list(&self, kind: ResourceKind, selector: Option<&str>) -> Result<Vec<Value>>;

    /// Creates a resource and returns the status code of the store.
    async fn create(&self, kind: ResourceKind, body: &Value) -> Result<u16>;

    /// Applies `mutator` to the stored object and writes the result back.
    ///
    /// A mutator returning `Ok(None)` signals that no write is needed. A
    /// mutator error aborts the update without writing.
    async fn update(
        &self,
        path: &ResourcePath,
        mutator: &(dyn Fn(Value) -> Result<Option<Value>> + Send + Sync),
    ) -> Result<UpdateOutcome>;

    /// Deletes a resource and returns the status code of the store.
    async fn delete(&self, path: &ResourcePath) -> Result<u16>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}

impl ResourceKind {
    /// Returns the plural collection name of this kind.
    #[must_use]
    pub const fn plural(self) -> &'static str {
        match self {
            Self::ConfigMap => "configmaps",
            Self::AddressPlan => "addressplans",
            Self::AddressSpacePlan => "addressspaceplans",
        }
    }

    /// Returns the API prefix under which this kind is served.
    #[must_use]
    pub const fn api_prefix(self) -> &'static str {
        match self {
            Self::ConfigMap => "api/v1",
            Self::AddressPlan | Self::AddressSpacePlan => "apis/admin.enmasse.io/v1beta1",
        }
    }
}

impl ResourcePath {
    /// Creates a path for a named resource.
    #[must_use]
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Creates a path for a named `ConfigMap`.
    #[must_use]
    pub fn config_map(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::ConfigMap, name)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.plural())
    }
}

impl std::fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}
