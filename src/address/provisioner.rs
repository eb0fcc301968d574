//! Address provisioner for creating and deleting address resources.
//!
//! Each address is stored as one `ConfigMap` labelled so that the agent's
//! watch selector picks it up.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::{ADDRESS_CONFIG_LABEL, AgentConfig};
use crate::error::{AddressError, AgentError, Result, status_reason};
use crate::store::{ResourceKind, ResourcePath, ResourceStore};

use super::naming::{address_resource_name, namespaced_name};
use super::types::{
    ADDRESS_API_VERSION, AddressDefinition, AddressResource, CONFIG_KEY, ConfigMap, ObjectMeta,
};

/// Address type whose spec carries a topic.
const SUBSCRIPTION_TYPE: &str = "subscription";

/// Provisioner for address resources.
#[derive(Debug)]
pub struct AddressProvisioner<S: ResourceStore> {
    /// Resource store.
    store: Arc<S>,
    /// Address space new addresses belong to.
    address_space: String,
    /// Optional resource name prefix.
    namespace: Option<String>,
    /// Optional infrastructure id label.
    infra_uuid: Option<String>,
}

impl<S: ResourceStore> AddressProvisioner<S> {
    /// Creates a new provisioner.
    #[must_use]
    pub fn new(store: Arc<S>, config: &AgentConfig) -> Self {
        Self {
            store,
            address_space: config.address_space.clone(),
            namespace: config.address_space_namespace.clone(),
            infra_uuid: config.infra_uuid.clone(),
        }
    }

    /// Builds the stored resource for a new address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address document cannot be serialized.
    pub fn build_config_map(&self, definition: &AddressDefinition) -> Result<ConfigMap> {
        let address_name = address_resource_name(&self.address_space, &definition.address);
        let config_map_name = namespaced_name(self.namespace.as_deref(), &address_name);

        let mut spec = definition.spec();
        if spec.address_type != SUBSCRIPTION_TYPE {
            spec.topic = None;
        }

        let document = AddressResource {
            api_version: Some(String::from(ADDRESS_API_VERSION)),
            kind: Some(String::from("Address")),
            metadata: ObjectMeta {
                name: Some(address_name),
                namespace: self.namespace.clone(),
                address_space: Some(self.address_space.clone()),
                ..ObjectMeta::default()
            },
            spec: Some(spec),
            status: None,
        };
        let serialized = serde_json::to_string(&document)
            .map_err(|e| AgentError::internal(format!("Failed to serialize address: {e}")))?;

        let mut labels = BTreeMap::new();
        labels.insert(String::from("type"), String::from(ADDRESS_CONFIG_LABEL));
        labels.insert(String::from("infraType"), String::from("any"));
        if let Some(uuid) = &self.infra_uuid {
            labels.insert(String::from("infraUuid"), uuid.clone());
        }

        let mut annotations = BTreeMap::new();
        annotations.insert(String::from("addressSpace"), self.address_space.clone());

        let mut data = BTreeMap::new();
        data.insert(String::from(CONFIG_KEY), serialized);

        Ok(ConfigMap {
            api_version: String::from("v1"),
            kind: String::from("ConfigMap"),
            metadata: ObjectMeta {
                name: Some(config_map_name),
                labels,
                annotations,
                ..ObjectMeta::default()
            },
            data,
        })
    }

    /// Creates the resource for a new address.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::Create`] if the store rejects the resource,
    /// or a store error if it cannot be reached.
    pub async fn create(&self, definition: &AddressDefinition) -> Result<()> {
        let config_map = self.build_config_map(definition)?;
        let body: Value = serde_json::to_value(&config_map)
            .map_err(|e| AgentError::internal(format!("Failed to serialize config map: {e}")))?;

        let status = self.store.create(ResourceKind::ConfigMap, &body).await?;
        if status >= 300 {
            error!(
                "Failed to create config map for {} [{status} {}]",
                definition.address,
                status_reason(status)
            );
            return Err(AddressError::Create {
                status,
                message: format!(
                    "{} for address {} ({})",
                    status_reason(status),
                    definition.address,
                    definition.address_type
                ),
            }
            .into());
        }

        info!(
            "Created address {} as {}",
            definition.address,
            config_map.metadata.name.as_deref().unwrap_or_default()
        );
        Ok(())
    }

    /// Deletes the resource of an address.
    ///
    /// A resource that is already gone counts as deleted.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::Delete`] if the store rejects the deletion,
    /// or a store error if it cannot be reached.
    pub async fn delete(&self, definition: &AddressDefinition) -> Result<()> {
        let name = self.resource_name_for(definition);
        let status = self.store.delete(&ResourcePath::config_map(&name)).await?;

        match status {
            200..=299 => {
                info!("Deleted address {} ({name})", definition.address);
                Ok(())
            }
            404 => {
                debug!("Address {} ({name}) already deleted", definition.address);
                Ok(())
            }
            _ => {
                error!(
                    "Failed to delete config map {name} [{status} {}]",
                    status_reason(status)
                );
                Err(AddressError::Delete {
                    status,
                    message: format!("{} for address {}", status_reason(status), definition.address),
                }
                .into())
            }
        }
    }

    /// Returns the stored resource name of an existing address.
    #[must_use]
    pub fn resource_name_for(&self, definition: &AddressDefinition) -> String {
        let name = if definition.name.is_empty() {
            address_resource_name(&self.address_space, &definition.address)
        } else {
            definition.name.clone()
        };
        namespaced_name(self.namespace.as_deref(), &name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryResourceStore;

    fn provisioner(store: &Arc<MemoryResourceStore>) -> AddressProvisioner<MemoryResourceStore> {
        let mut config = AgentConfig::new("myspace");
        config.infra_uuid = Some(String::from("infra-1"));
        AddressProvisioner::new(Arc::clone(store), &config)
    }

    #[tokio::test]
    async fn test_create_stores_labelled_config_map() {
        let store = Arc::new(MemoryResourceStore::new());
        let provisioner = provisioner(&store);

        provisioner
            .create(&AddressDefinition::new("Orders", "queue", "small-queue"))
            .await
            .expect("create should succeed");

        let listed = store
            .list(ResourceKind::ConfigMap, Some("type=address-config,infraUuid=infra-1"))
            .await
            .expect("list");
        assert_eq!(listed.len(), 1);

        let config_map: ConfigMap = serde_json::from_value(listed[0].clone()).expect("config map");
        let name = config_map.metadata.name.clone().expect("name");
        assert!(name.starts_with("myspace.orders-"));
        assert_eq!(
            config_map.metadata.annotations.get("addressSpace").map(String::as_str),
            Some("myspace")
        );

        let def = AddressDefinition::from_config_map(&config_map).expect("round trip");
        assert_eq!(def.address, "Orders");
        assert_eq!(def.plan, "small-queue");
        assert_eq!(def.name, name);
        assert!(def.status.is_none());
    }

    #[tokio::test]
    async fn test_topic_only_for_subscriptions() {
        let store = Arc::new(MemoryResourceStore::new());
        let provisioner = provisioner(&store);

        let queue = provisioner
            .build_config_map(&AddressDefinition::new("q", "queue", "p").with_topic("t"))
            .expect("build");
        let sub = provisioner
            .build_config_map(&AddressDefinition::new("s", "subscription", "p").with_topic("t"))
            .expect("build");

        let queue_def = AddressDefinition::from_config_map(&queue).expect("parse");
        let sub_def = AddressDefinition::from_config_map(&sub).expect("parse");
        assert!(queue_def.topic.is_none());
        assert_eq!(sub_def.topic.as_deref(), Some("t"));
    }

    #[tokio::test]
    async fn test_create_rejected() {
        let store = Arc::new(MemoryResourceStore::new());
        let provisioner = provisioner(&store);
        let def = AddressDefinition::new("q1", "queue", "small");

        provisioner.create(&def).await.expect("first create");
        let err = provisioner.create(&def).await.expect_err("duplicate create");

        assert!(matches!(
            err,
            AgentError::Address(AddressError::Create { status: 409, .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = Arc::new(MemoryResourceStore::new());
        let provisioner = provisioner(&store);
        let def = AddressDefinition::new("q1", "queue", "small");

        provisioner.create(&def).await.expect("create");
        provisioner.delete(&def).await.expect("delete");
        provisioner.delete(&def).await.expect("second delete is a no-op");

        assert!(store.list(ResourceKind::ConfigMap, None).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_delete_rejected() {
        let store = Arc::new(MemoryResourceStore::new());
        let provisioner = provisioner(&store);
        store.reject_writes_with(500);

        let err = provisioner
            .delete(&AddressDefinition::new("q1", "queue", "small").with_name("myspace.q1"))
            .await
            .expect_err("delete should fail");
        assert!(matches!(
            err,
            AgentError::Address(AddressError::Delete { status: 500, .. })
        ));
    }

    #[test]
    fn test_resource_name_prefers_definition_name() {
        let store = Arc::new(MemoryResourceStore::new());
        let mut config = AgentConfig::new("myspace");
        config.address_space_namespace = Some(String::from("tenant"));
        let provisioner = AddressProvisioner::new(store, &config);

        let named = AddressDefinition::new("q1", "queue", "p").with_name("custom");
        let unnamed = AddressDefinition::new("q1", "queue", "p");

        assert_eq!(provisioner.resource_name_for(&named), "tenant.custom");
        assert_eq!(provisioner.resource_name_for(&unnamed), "tenant.myspace.q1");
    }
}
