//! The address agent.
//!
//! [`AddressAgent`] wires the controller, the address provisioner and the
//! plan catalog to one resource store and exposes the operations callers
//! use: feeding watch batches, creating and deleting addresses, readiness
//! checks and plan queries.

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::address::{AddressDefinition, AddressProvisioner, ConfigMap};
use crate::config::AgentConfig;
use crate::controller::{self, ControllerHandle, ControllerSnapshot, DEFAULT_QUEUE_DEPTH, ResourceWatcher};
use crate::error::{PlanError, Result};
use crate::plans::{AddressTypeSummary, PlanCatalog};
use crate::readiness::{StatsMap, StatusReport};
use crate::reconciler::{AddressReconciler, Notification, ReconcileOutcome};
use crate::store::{HttpResourceStore, ResourceStore};

/// Agent serving one address space.
#[derive(Debug)]
pub struct AddressAgent<S: ResourceStore + 'static> {
    config: AgentConfig,
    store: Arc<S>,
    provisioner: AddressProvisioner<S>,
    catalog: PlanCatalog<S>,
    controller: ControllerHandle,
    task: JoinHandle<()>,
}

impl AddressAgent<HttpResourceStore> {
    /// Starts an agent talking to the API server named in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn connect(config: AgentConfig) -> Result<Self> {
        let store = Arc::new(HttpResourceStore::new(&config.store)?);
        Ok(Self::start(store, config))
    }
}

impl<S: ResourceStore + 'static> AddressAgent<S> {
    /// Starts an agent on `store`.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn start(store: Arc<S>, config: AgentConfig) -> Self {
        let reconciler = AddressReconciler::new(Arc::clone(&store), &config);
        let (controller, task) = controller::spawn(reconciler, DEFAULT_QUEUE_DEPTH);
        info!(
            "Address agent {} started for {} on {} store",
            controller.agent_id(),
            config.address_space,
            store.backend_type()
        );

        Self {
            provisioner: AddressProvisioner::new(Arc::clone(&store), &config),
            catalog: PlanCatalog::new(Arc::clone(&store)),
            config,
            store,
            controller,
            task,
        }
    }

    /// Returns the agent configuration.
    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Returns a handle to the controller.
    #[must_use]
    pub fn controller(&self) -> ControllerHandle {
        self.controller.clone()
    }

    /// Returns a watcher feeding this agent's address resources.
    #[must_use]
    pub fn watcher(&self) -> ResourceWatcher<S> {
        ResourceWatcher::new(Arc::clone(&self.store), &self.config)
    }

    /// Subscribes to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.controller.subscribe()
    }

    /// Applies a batch of watched resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the controller has stopped.
    pub async fn on_watch_update(&self, resources: Vec<ConfigMap>) -> Result<ReconcileOutcome> {
        self.controller.watch_update(resources).await
    }

    /// Creates an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the address.
    pub async fn create_address(&self, definition: &AddressDefinition) -> Result<()> {
        self.provisioner.create(definition).await
    }

    /// Deletes an address. Deleting a missing address succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the deletion.
    pub async fn delete_address(&self, definition: &AddressDefinition) -> Result<()> {
        self.provisioner.delete(definition).await
    }

    /// Compares readiness against broker stats and writes every change
    /// back to the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the controller has stopped.
    pub async fn check_status(&self, stats: StatsMap) -> Result<StatusReport> {
        self.controller.check_status(stats).await
    }

    /// Lists the address types permitted by the configured address space
    /// plan.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::NotFound`] if no plan is configured or the plan
    /// does not exist.
    pub async fn get_address_types(&self) -> Result<Vec<AddressTypeSummary>> {
        if self.config.address_space_plan.is_empty() {
            warn!("No address space plan configured");
            return Err(PlanError::NotFound {
                kind: String::from("Address space plan"),
                name: String::new(),
            }
            .into());
        }
        self.catalog.list_address_types(&self.config.address_space_plan).await
    }

    /// Returns the current controller state.
    ///
    /// # Errors
    ///
    /// Returns an error if the controller has stopped.
    pub async fn snapshot(&self) -> Result<ControllerSnapshot> {
        self.controller.snapshot().await
    }

    /// Stops the controller and waits for it to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the controller task panicked.
    pub async fn shutdown(self) -> Result<()> {
        self.controller.shutdown().await;
        self.task
            .await
            .map_err(|e| crate::error::AgentError::internal(format!("Controller task failed: {e}")))?;
        info!("Address agent stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryResourceStore, ResourceKind};
    use serde_json::json;

    fn agent() -> (Arc<MemoryResourceStore>, AddressAgent<MemoryResourceStore>) {
        let store = Arc::new(MemoryResourceStore::new());
        let mut config = AgentConfig::new("space");
        config.address_space_plan = String::from("standard");
        (Arc::clone(&store), AddressAgent::start(store, config))
    }

    #[tokio::test]
    async fn test_create_watch_and_check() {
        let (_store, agent) = agent();
        let mut rx = agent.subscribe();

        agent
            .create_address(&AddressDefinition::new("q1", "queue", "small"))
            .await
            .expect("create");
        let listing = agent.watcher().list_once().await.expect("list");
        let outcome = agent.on_watch_update(listing).await.expect("batch");
        assert_eq!(outcome.defined_changes, Some(1));
        assert_eq!(outcome.ready_changes, Some(0));

        let defined = rx.recv().await.expect("defined");
        assert_eq!(defined.addresses()[0].address, "q1");
        let ready = rx.recv().await.expect("ready");
        assert!(ready.addresses().is_empty());

        let mut stats = StatsMap::new();
        stats.insert(String::from("q1"), crate::readiness::PropagationStats::new(100.0));
        let report = agent.check_status(stats).await.expect("check");
        assert_eq!(report.updated, 1);

        let snapshot = agent.snapshot().await.expect("snapshot");
        assert!(snapshot.readiness[0].ready);

        tokio_test::assert_ok!(agent.shutdown().await);
    }

    #[tokio::test]
    async fn test_delete_address() {
        let (store, agent) = agent();
        let def = AddressDefinition::new("q1", "queue", "small");
        agent.create_address(&def).await.expect("create");
        agent.delete_address(&def).await.expect("delete");
        assert!(store.list(ResourceKind::ConfigMap, None).await.expect("list").is_empty());
        tokio_test::assert_ok!(agent.shutdown().await);
    }

    #[tokio::test]
    async fn test_get_address_types() {
        let (store, agent) = agent();
        store
            .insert(
                ResourceKind::AddressSpacePlan,
                json!({"metadata": {"name": "standard"}, "addressPlans": ["p1"]}),
            )
            .await;
        store
            .insert(
                ResourceKind::AddressPlan,
                json!({"metadata": {"name": "p1"}, "addressType": "queue"}),
            )
            .await;

        let types = agent.get_address_types().await.expect("types");
        assert_eq!(types.len(), 1);
        assert_eq!(agent.config().address_space_plan, "standard");
        tokio_test::assert_ok!(agent.shutdown().await);
    }
}
