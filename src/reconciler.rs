//! Reconciler for the watched address set.
//!
//! This module implements the watch callback: it parses each batch of
//! stored resources, diffs the batch against the previous one, keeps the
//! readiness ledger in step with the defined set, and notifies subscribers
//! when the defined or ready projections change.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::address::{AddressDefinition, ConfigMap};
use crate::config::AgentConfig;
use crate::diff::{ChangeSet, DiffEngine};
use crate::readiness::{ReadinessLedger, StatsMap, StatusReport, StatusUpdater};
use crate::store::ResourceStore;

/// Change notification sent to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    /// The set of defined addresses changed.
    AddressesDefined {
        /// Every currently defined address, ordered by address.
        addresses: Vec<AddressDefinition>,
        /// Summary of the changed addresses.
        description: String,
        /// When the batch was processed.
        observed_at: DateTime<Utc>,
    },
    /// The set of ready addresses changed.
    AddressesReady {
        /// Every currently ready address, ordered by address.
        addresses: Vec<AddressDefinition>,
        /// Summary of the changed addresses.
        description: String,
        /// When the batch was processed.
        observed_at: DateTime<Utc>,
    },
}

impl Notification {
    /// Returns the event name of this notification.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::AddressesDefined { .. } => "addresses_defined",
            Self::AddressesReady { .. } => "addresses_ready",
        }
    }

    /// Returns the full address set carried by this notification.
    #[must_use]
    pub fn addresses(&self) -> &[AddressDefinition] {
        match self {
            Self::AddressesDefined { addresses, .. } | Self::AddressesReady { addresses, .. } => {
                addresses
            }
        }
    }

    /// Returns the change summary carried by this notification.
    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Self::AddressesDefined { description, .. }
            | Self::AddressesReady { description, .. } => description,
        }
    }
}

/// Result of processing one watch batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    /// Resources parsed into addresses.
    pub parsed: usize,
    /// Resources skipped because they could not be parsed.
    pub skipped: usize,
    /// Number of changed defined addresses, if the defined set changed.
    pub defined_changes: Option<usize>,
    /// Number of changed ready addresses, if the ready set changed.
    pub ready_changes: Option<usize>,
}

impl ReconcileOutcome {
    /// Returns true if any notification was sent for the batch.
    #[must_use]
    pub const fn notified(&self) -> bool {
        self.defined_changes.is_some() || self.ready_changes.is_some()
    }
}

/// Reconciler owning the last observed snapshots and the readiness ledger.
#[derive(Debug)]
pub struct AddressReconciler<S: ResourceStore> {
    /// Diff engine.
    diff_engine: DiffEngine,
    /// Last defined snapshot, sorted by address.
    last_defined: Option<Vec<AddressDefinition>>,
    /// Last ready snapshot, sorted by address.
    last_ready: Option<Vec<AddressDefinition>>,
    /// Readiness of every defined address.
    ledger: ReadinessLedger,
    /// Writes readiness flips to the store.
    updater: StatusUpdater<S>,
    /// Notification fan-out.
    notifications: broadcast::Sender<Notification>,
}

impl<S: ResourceStore> AddressReconciler<S> {
    /// Creates a reconciler writing status through `store`.
    #[must_use]
    pub fn new(store: Arc<S>, config: &AgentConfig) -> Self {
        let (notifications, _) = broadcast::channel(config.notification_capacity.max(1));
        Self {
            diff_engine: DiffEngine::new(),
            last_defined: None,
            last_ready: None,
            ledger: ReadinessLedger::new(),
            updater: StatusUpdater::new(store, config.address_space_namespace.clone()),
            notifications,
        }
    }

    /// Subscribes to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Returns a sender handle for creating further subscriptions.
    #[must_use]
    pub fn notification_sender(&self) -> broadcast::Sender<Notification> {
        self.notifications.clone()
    }

    /// Returns the readiness ledger.
    #[must_use]
    pub const fn ledger(&self) -> &ReadinessLedger {
        &self.ledger
    }

    /// Returns the last defined snapshot, if a batch has been processed.
    #[must_use]
    pub fn last_defined(&self) -> Option<&[AddressDefinition]> {
        self.last_defined.as_deref()
    }

    /// Returns the last ready snapshot, if it has been computed.
    #[must_use]
    pub fn last_ready(&self) -> Option<&[AddressDefinition]> {
        self.last_ready.as_deref()
    }

    /// Processes one batch of watched resources.
    ///
    /// The ready projection is only recomputed when the defined set
    /// changed.
    pub fn on_watch_update(&mut self, resources: &[ConfigMap]) -> ReconcileOutcome {
        debug!("Addresses updated: {} resources", resources.len());

        let mut outcome = ReconcileOutcome::default();
        let mut defined = Vec::with_capacity(resources.len());
        for resource in resources {
            match AddressDefinition::from_config_map(resource) {
                Ok(definition) => defined.push(definition),
                Err(e) => {
                    error!("Skipping address resource: {e}");
                    outcome.skipped += 1;
                }
            }
        }
        outcome.parsed = defined.len();

        let defined = DiffEngine::sorted(&defined);
        let Some(changes) = self.diff_engine.compute(
            self.last_defined.as_deref(),
            &defined,
            AddressDefinition::same_definition_and_status,
        ) else {
            debug!("No change to defined addresses");
            self.last_defined = Some(defined);
            return outcome;
        };

        outcome.defined_changes = Some(changes.total_changes());
        self.ledger.apply_changes(&changes);

        let ready: Vec<AddressDefinition> = defined
            .iter()
            .filter(|d| d.is_ready())
            .cloned()
            .collect();
        self.last_defined = Some(defined.clone());
        self.dispatch(Notification::AddressesDefined {
            addresses: defined,
            description: changes.description,
            observed_at: Utc::now(),
        });

        if let Some(ready_changes) = self.ready_changes(&ready) {
            outcome.ready_changes = Some(ready_changes.total_changes());
            self.dispatch(Notification::AddressesReady {
                addresses: ready,
                description: ready_changes.description,
                observed_at: Utc::now(),
            });
        }

        outcome
    }

    /// Compares the ledger against broker stats and pushes every readiness
    /// flip to the store.
    ///
    /// Waits until all pushes have settled. Failed pushes are logged and
    /// counted; the ledger keeps the new state.
    pub async fn check_status(&mut self, stats: &StatsMap) -> StatusReport {
        let transitions = self.ledger.evaluate(stats);
        if transitions.is_empty() {
            debug!("No readiness changes");
            return StatusReport::default();
        }

        let report = self.updater.push_all(&transitions).await;
        info!(
            "Status check: {} updated, {} unchanged, {} failed",
            report.updated, report.unchanged, report.failed
        );
        report
    }

    fn ready_changes(&mut self, ready: &[AddressDefinition]) -> Option<ChangeSet<AddressDefinition>> {
        let changes = self.diff_engine.compute(
            self.last_ready.as_deref(),
            ready,
            AddressDefinition::same_definition,
        );
        self.last_ready = Some(ready.to_vec());
        changes
    }

    fn dispatch(&self, notification: Notification) {
        info!("{}: {}", notification.event_name(), notification.description());
        if self.notifications.send(notification).is_err() {
            debug!("No subscribers for notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{CONFIG_KEY, ObjectMeta};
    use crate::readiness::PropagationStats;
    use crate::store::{MemoryResourceStore, ResourceKind, ResourcePath};
    use serde_json::{Value, json};
    use std::collections::BTreeMap;

    fn config_map(address: &str, address_type: &str, phase: Option<&str>) -> ConfigMap {
        let mut document = json!({
            "apiVersion": "enmasse.io/v1alpha1",
            "kind": "Address",
            "metadata": {"name": format!("space.{address}")},
            "spec": {"address": address, "type": address_type, "plan": "small"}
        });
        if let Some(phase) = phase {
            document["status"] = json!({"isReady": false, "phase": phase});
        }

        let mut data = BTreeMap::new();
        data.insert(CONFIG_KEY.to_string(), document.to_string());
        ConfigMap {
            api_version: String::from("v1"),
            kind: String::from("ConfigMap"),
            metadata: ObjectMeta {
                name: Some(format!("space.{address}")),
                ..ObjectMeta::default()
            },
            data,
        }
    }

    fn reconciler(store: &Arc<MemoryResourceStore>) -> AddressReconciler<MemoryResourceStore> {
        AddressReconciler::new(Arc::clone(store), &AgentConfig::new("space"))
    }

    fn drain(rx: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
        let mut received = Vec::new();
        while let Ok(notification) = rx.try_recv() {
            received.push(notification);
        }
        received
    }

    #[test]
    fn test_initial_batch() {
        let store = Arc::new(MemoryResourceStore::new());
        let mut reconciler = reconciler(&store);
        let mut rx = reconciler.subscribe();

        let outcome = reconciler.on_watch_update(&[config_map("q1", "queue", Some("Active"))]);

        assert_eq!(outcome.parsed, 1);
        assert_eq!(outcome.defined_changes, Some(1));
        assert_eq!(outcome.ready_changes, Some(1));

        let received = drain(&mut rx);
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].event_name(), "addresses_defined");
        assert_eq!(received[0].addresses().len(), 1);
        assert_eq!(received[1].event_name(), "addresses_ready");
        assert_eq!(received[1].addresses()[0].address, "q1");

        let record = reconciler.ledger().get("q1").expect("record created");
        assert!(!record.ready);
        assert_eq!(record.name, "space.q1");
    }

    #[test]
    fn test_identical_batch_is_silent() {
        let store = Arc::new(MemoryResourceStore::new());
        let mut reconciler = reconciler(&store);
        let batch = [config_map("q1", "queue", Some("Active"))];
        reconciler.on_watch_update(&batch);
        let mut rx = reconciler.subscribe();

        let outcome = reconciler.on_watch_update(&batch);

        assert!(!outcome.notified());
        assert!(drain(&mut rx).is_empty());
        assert_eq!(reconciler.ledger().len(), 1);
    }

    #[test]
    fn test_reordered_batch_is_silent() {
        let store = Arc::new(MemoryResourceStore::new());
        let mut reconciler = reconciler(&store);
        reconciler.on_watch_update(&[
            config_map("a", "queue", None),
            config_map("b", "topic", Some("Active")),
            config_map("c", "anycast", Some("Pending")),
        ]);

        let outcome = reconciler.on_watch_update(&[
            config_map("c", "anycast", Some("Pending")),
            config_map("a", "queue", None),
            config_map("b", "topic", Some("Active")),
        ]);

        assert!(!outcome.notified());
    }

    #[test]
    fn test_empty_first_batch_notifies() {
        let store = Arc::new(MemoryResourceStore::new());
        let mut reconciler = reconciler(&store);
        let mut rx = reconciler.subscribe();

        let outcome = reconciler.on_watch_update(&[]);

        assert_eq!(outcome.defined_changes, Some(0));
        let received = drain(&mut rx);
        assert_eq!(received.len(), 2);
        assert!(received.iter().all(|n| n.addresses().is_empty()));
        assert_eq!(reconciler.last_defined().map(<[_]>::len), Some(0));
    }

    #[test]
    fn test_removal_drops_record_and_notifies() {
        let store = Arc::new(MemoryResourceStore::new());
        let mut reconciler = reconciler(&store);
        reconciler.on_watch_update(&[
            config_map("q1", "queue", Some("Active")),
            config_map("q2", "queue", Some("Active")),
        ]);
        let mut rx = reconciler.subscribe();

        let outcome = reconciler.on_watch_update(&[config_map("q1", "queue", Some("Active"))]);

        assert_eq!(outcome.defined_changes, Some(1));
        assert_eq!(outcome.ready_changes, Some(1));
        assert!(reconciler.ledger().get("q2").is_none());
        let received = drain(&mut rx);
        assert_eq!(received[0].description(), "[\"q2\"]");
    }

    #[test]
    fn test_status_only_change() {
        let store = Arc::new(MemoryResourceStore::new());
        let mut reconciler = reconciler(&store);
        reconciler.on_watch_update(&[config_map("q1", "queue", Some("Active"))]);
        let mut rx = reconciler.subscribe();

        let outcome = reconciler.on_watch_update(&[config_map("q1", "queue", Some("Configuring"))]);

        assert_eq!(outcome.defined_changes, Some(1));
        assert_eq!(outcome.ready_changes, None);
        let received = drain(&mut rx);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].event_name(), "addresses_defined");
        assert_eq!(reconciler.ledger().len(), 1);
    }

    #[test]
    fn test_unrecognized_phase_keeps_address_defined() {
        let store = Arc::new(MemoryResourceStore::new());
        let mut reconciler = reconciler(&store);
        reconciler.on_watch_update(&[config_map("q1", "queue", Some("Active"))]);
        let mut rx = reconciler.subscribe();

        let outcome = reconciler.on_watch_update(&[config_map("q1", "queue", Some("Unknown"))]);

        assert_eq!(outcome.parsed, 1);
        assert_eq!(outcome.skipped, 0);
        assert_eq!(outcome.defined_changes, Some(1));
        assert_eq!(outcome.ready_changes, None);
        assert_eq!(reconciler.ledger().len(), 1);
        assert_eq!(reconciler.last_defined().map(<[_]>::len), Some(1));
        assert_eq!(reconciler.last_ready().map(<[_]>::len), Some(1));

        let received = drain(&mut rx);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].event_name(), "addresses_defined");
    }

    #[test]
    fn test_pending_addresses_leave_ready_set() {
        let store = Arc::new(MemoryResourceStore::new());
        let mut reconciler = reconciler(&store);
        reconciler.on_watch_update(&[config_map("q1", "queue", Some("Active"))]);

        let outcome = reconciler.on_watch_update(&[config_map("q1", "queue", Some("Terminating"))]);

        assert_eq!(outcome.ready_changes, Some(1));
        assert_eq!(reconciler.last_ready().map(<[_]>::len), Some(0));
    }

    #[test]
    fn test_unparseable_resources_are_skipped() {
        let store = Arc::new(MemoryResourceStore::new());
        let mut reconciler = reconciler(&store);
        let mut broken = config_map("bad", "queue", None);
        broken.data.insert(CONFIG_KEY.to_string(), String::from("{oops"));

        let outcome = reconciler.on_watch_update(&[broken, config_map("q1", "queue", None)]);

        assert_eq!(outcome.parsed, 1);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(reconciler.ledger().len(), 1);
    }

    #[tokio::test]
    async fn test_check_status_pushes_ready() {
        let store = Arc::new(MemoryResourceStore::new());
        let resource = config_map("q1", "queue", Some("Active"));
        store
            .insert(
                ResourceKind::ConfigMap,
                serde_json::to_value(&resource).expect("serialize"),
            )
            .await;
        let mut reconciler = reconciler(&store);
        reconciler.on_watch_update(&[resource]);

        let mut stats = StatsMap::new();
        stats.insert(String::from("q1"), PropagationStats::new(100.0));
        let report = reconciler.check_status(&stats).await;

        assert_eq!(report.updated, 1);
        assert_eq!(store.update_calls().await, vec![String::from("configmaps/space.q1")]);
        assert!(reconciler.ledger().get("q1").expect("record").ready);

        let stored = store
            .get(&ResourcePath::config_map("space.q1"))
            .await
            .expect("stored");
        let raw = stored
            .pointer("/data/config.json")
            .and_then(Value::as_str)
            .expect("document");
        let document: Value = serde_json::from_str(raw).expect("json");
        assert_eq!(document["status"]["isReady"], json!(true));
        assert_eq!(document["status"]["phase"], json!("Active"));

        let again = reconciler.check_status(&stats).await;
        assert_eq!(again.total(), 0);
    }

    #[tokio::test]
    async fn test_failed_push_keeps_ledger_state() {
        let store = Arc::new(MemoryResourceStore::new());
        let mut reconciler = reconciler(&store);
        reconciler.on_watch_update(&[config_map("q1", "queue", None)]);

        let mut stats = StatsMap::new();
        stats.insert(String::from("q1"), PropagationStats::new(100.0));
        let report = reconciler.check_status(&stats).await;

        assert_eq!(report.failed, 1);
        assert!(reconciler.ledger().get("q1").expect("record").ready);
    }
}
