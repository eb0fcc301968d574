//! Readiness tracking for defined addresses.
//!
//! The ledger holds one record per currently defined address. Records are
//! created and dropped from the diffs of the defined set, and flipped by
//! comparing broker propagation stats against the recorded state. Every
//! flip is pushed back to the stored address document.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::address::{AddressDefinition, CONFIG_KEY, Phase, namespaced_name};
use crate::diff::ChangeSet;
use crate::error::{AddressError, AgentError};
use crate::store::{ResourcePath, ResourceStore, UpdateOutcome};

/// Propagation value meaning every broker has applied the address.
pub const FULLY_PROPAGATED: f64 = 100.0;

/// Broker-reported propagation of one address.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PropagationStats {
    /// Percentage of brokers that have applied the address, 0 to 100.
    pub propagated: f64,
}

impl PropagationStats {
    /// Creates stats with the given propagation percentage.
    #[must_use]
    pub const fn new(propagated: f64) -> Self {
        Self { propagated }
    }

    /// Returns true if the address is applied on every broker.
    #[must_use]
    pub fn is_fully_propagated(&self) -> bool {
        (self.propagated - FULLY_PROPAGATED).abs() < f64::EPSILON
    }
}

/// Propagation stats keyed by address.
pub type StatsMap = HashMap<String, PropagationStats>;

/// Readiness of one defined address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadinessRecord {
    /// The address.
    pub address: String,
    /// Name of the address document.
    pub name: String,
    /// Whether the address was last seen fully propagated.
    pub ready: bool,
    /// When `ready` last changed.
    pub last_transition: Option<DateTime<Utc>>,
}

/// A readiness flip decided by [`ReadinessLedger::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransition {
    /// The address.
    pub address: String,
    /// Name of the address document.
    pub name: String,
    /// The new readiness.
    pub ready: bool,
}

/// Readiness records of all currently defined addresses.
#[derive(Debug, Default)]
pub struct ReadinessLedger {
    records: BTreeMap<String, ReadinessRecord>,
}

impl ReadinessLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a diff of the defined set.
    ///
    /// Added addresses get a not-ready record unless one already exists;
    /// removed addresses lose theirs. Modified addresses are left alone.
    pub fn apply_changes(&mut self, changes: &ChangeSet<AddressDefinition>) {
        for definition in &changes.added {
            self.records
                .entry(definition.address.clone())
                .or_insert_with(|| ReadinessRecord {
                    address: definition.address.clone(),
                    name: definition.name.clone(),
                    ready: false,
                    last_transition: None,
                });
        }

        for definition in &changes.removed {
            if self.records.remove(&definition.address).is_some() {
                debug!("Dropped readiness record for {}", definition.address);
            }
        }
    }

    /// Compares every record against `stats` and flips those whose
    /// propagation disagrees with the recorded readiness.
    ///
    /// Records are updated in place before anything is written to the
    /// store. Addresses without stats keep their state.
    pub fn evaluate(&mut self, stats: &StatsMap) -> Vec<StatusTransition> {
        let now = Utc::now();
        let mut transitions = Vec::new();

        for record in self.records.values_mut() {
            let Some(address_stats) = stats.get(&record.address) else {
                info!("No stats supplied for {} (ready: {})", record.address, record.ready);
                continue;
            };

            let propagated = address_stats.is_fully_propagated();
            if propagated == record.ready {
                continue;
            }

            if propagated {
                info!("{} is now ready", record.address);
            } else {
                info!("{} is no longer ready", record.address);
            }

            record.ready = propagated;
            record.last_transition = Some(now);
            transitions.push(StatusTransition {
                address: record.address.clone(),
                name: record.name.clone(),
                ready: propagated,
            });
        }

        transitions
    }

    /// Returns the record of an address.
    #[must_use]
    pub fn get(&self, address: &str) -> Option<&ReadinessRecord> {
        self.records.get(address)
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the ledger holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns all records ordered by address.
    pub fn records(&self) -> impl Iterator<Item = &ReadinessRecord> {
        self.records.values()
    }
}

/// Outcome of pushing a batch of status transitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Documents rewritten with the new status.
    pub updated: usize,
    /// Documents that already carried the new status.
    pub unchanged: usize,
    /// Writes that failed.
    pub failed: usize,
}

impl StatusReport {
    /// Returns the number of transitions in the batch.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.updated + self.unchanged + self.failed
    }
}

/// Writes readiness flips back to the stored address documents.
#[derive(Debug)]
pub struct StatusUpdater<S: ResourceStore> {
    store: Arc<S>,
    namespace: Option<String>,
}

impl<S: ResourceStore> StatusUpdater<S> {
    /// Creates an updater writing through `store`.
    #[must_use]
    pub const fn new(store: Arc<S>, namespace: Option<String>) -> Self {
        Self { store, namespace }
    }

    /// Pushes one transition.
    ///
    /// Failures are logged and reported as `None`; the ledger keeps the new
    /// state either way.
    pub async fn push(&self, transition: &StatusTransition) -> Option<UpdateOutcome> {
        let path = ResourcePath::config_map(namespaced_name(self.namespace.as_deref(), &transition.name));
        let ready = transition.ready;
        let address = transition.address.as_str();

        match self
            .store
            .update(&path, &move |object: Value| {
                apply_readiness(object, ready).map_err(|message| {
                    AgentError::from(AddressError::Update {
                        address: address.to_string(),
                        message,
                    })
                })
            })
            .await
        {
            Ok(UpdateOutcome::Updated) => {
                info!("Updated status for {address} to {ready}");
                Some(UpdateOutcome::Updated)
            }
            Ok(UpdateOutcome::Unchanged) => {
                debug!("No need to update status for {address} ({path})");
                Some(UpdateOutcome::Unchanged)
            }
            Err(e) => {
                error!("Failed to update status for {address} ({path}): {e}");
                None
            }
        }
    }

    /// Pushes all transitions concurrently and waits for every one to
    /// settle.
    pub async fn push_all(&self, transitions: &[StatusTransition]) -> StatusReport {
        let outcomes = join_all(transitions.iter().map(|t| self.push(t))).await;

        let mut report = StatusReport::default();
        for outcome in outcomes {
            match outcome {
                Some(UpdateOutcome::Updated) => report.updated += 1,
                Some(UpdateOutcome::Unchanged) => report.unchanged += 1,
                None => report.failed += 1,
            }
        }
        report
    }
}

/// Rewrites the readiness of the address document inside a stored
/// resource.
///
/// Returns `Ok(None)` when the document already has the requested
/// readiness. Every other field of the document is kept.
///
/// # Errors
///
/// Returns a description of the problem if the resource carries no
/// readable address document.
pub fn apply_readiness(mut object: Value, ready: bool) -> std::result::Result<Option<Value>, String> {
    let raw = object
        .get("data")
        .and_then(|data| data.get(CONFIG_KEY))
        .and_then(Value::as_str)
        .ok_or_else(|| format!("no {CONFIG_KEY} entry"))?;
    let mut document: Value =
        serde_json::from_str(raw).map_err(|e| format!("invalid {CONFIG_KEY}: {e}"))?;

    let document_map = document
        .as_object_mut()
        .ok_or_else(|| format!("{CONFIG_KEY} is not an object"))?;
    let status = document_map
        .entry("status")
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    if !status.is_object() {
        *status = Value::Object(serde_json::Map::new());
    }
    let Some(status_map) = status.as_object_mut() else {
        return Err(String::from("status is not an object"));
    };

    if status_map.get("isReady").and_then(Value::as_bool) == Some(ready) {
        return Ok(None);
    }

    let phase = if ready { Phase::Active } else { Phase::Pending };
    status_map.insert(String::from("isReady"), Value::Bool(ready));
    status_map.insert(String::from("phase"), Value::String(phase.to_string()));

    let serialized = serde_json::to_string(&document)
        .map_err(|e| format!("cannot serialize {CONFIG_KEY}: {e}"))?;
    if let Some(data) = object.get_mut("data").and_then(Value::as_object_mut) {
        data.insert(String::from(CONFIG_KEY), Value::String(serialized));
    }
    Ok(Some(object))
}
