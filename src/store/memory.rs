//! In-process resource store backend.
//!
//! Objects are kept in memory, keyed by kind and name. The store mimics the
//! status codes of an API server so callers behave the same against both
//! backends.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU16, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, StoreError};

use super::api::{ResourceKind, ResourcePath, ResourceStore, UpdateOutcome};

/// Resource store that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryResourceStore {
    /// Stored objects by kind, then name.
    objects: RwLock<BTreeMap<ResourceKind, BTreeMap<String, Value>>>,
    /// Paths passed to `update`, in call order.
    update_calls: Mutex<Vec<String>>,
    /// Status forced onto creates and writes; zero when disabled.
    reject_status: AtomicU16,
}

impl MemoryResourceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an object without going through `create`.
    pub async fn insert(&self, kind: ResourceKind, object: Value) {
        let name = object_name(&object).unwrap_or_default();
        self.objects
            .write()
            .await
            .entry(kind)
            .or_default()
            .insert(name, object);
    }

    /// Returns a stored object.
    pub async fn get(&self, path: &ResourcePath) -> Option<Value> {
        self.objects
            .read()
            .await
            .get(&path.kind)
            .and_then(|objects| objects.get(&path.name))
            .cloned()
    }

    /// Returns the paths passed to `update` so far.
    pub async fn update_calls(&self) -> Vec<String> {
        self.update_calls.lock().await.clone()
    }

    /// Makes subsequent creates and writes fail with `status`.
    ///
    /// Passing zero restores normal behavior.
    pub fn reject_writes_with(&self, status: u16) {
        self.reject_status.store(status, Ordering::SeqCst);
    }

    fn forced_rejection(&self) -> Option<u16> {
        match self.reject_status.load(Ordering::SeqCst) {
            0 => None,
            status => Some(status),
        }
    }
}

fn object_name(object: &Value) -> Option<String> {
    object
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .map(String::from)
}

/// Returns true if `object`'s labels satisfy every `key=value` term of
/// `selector`.
#[must_use]
pub fn selector_matches(selector: &str, object: &Value) -> bool {
    let labels = object.pointer("/metadata/labels");
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((key, value)) => labels
                .and_then(|l| l.get(key.trim()))
                .and_then(Value::as_str)
                == Some(value.trim()),
            None => labels.and_then(|l| l.get(term)).is_some(),
        })
}

#[async_trait]
impl ResourceStore for MemoryResourceStore {
    async fn list(&self, kind: ResourceKind, selector: Option<&str>) -> Result<Vec<Value>> {
        let objects = self.objects.read().await;
        let items: Vec<Value> = objects
            .get(&kind)
            .map(|by_name| {
                by_name
                    .values()
                    .filter(|o| selector.is_none_or(|s| selector_matches(s, o)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        debug!("Listed {} {kind} from memory", items.len());
        Ok(items)
    }

    async fn create(&self, kind: ResourceKind, body: &Value) -> Result<u16> {
        if let Some(status) = self.forced_rejection() {
            return Ok(status);
        }
        let Some(name) = object_name(body) else {
            return Ok(422);
        };

        let mut objects = self.objects.write().await;
        let by_name = objects.entry(kind).or_default();
        if by_name.contains_key(&name) {
            return Ok(409);
        }

        let mut object = body.clone();
        if let Some(metadata) = object.get_mut("metadata").and_then(Value::as_object_mut) {
            metadata.insert(String::from("uid"), json!(Uuid::new_v4().to_string()));
            metadata.insert(
                String::from("creationTimestamp"),
                json!(Utc::now().to_rfc3339()),
            );
        }
        by_name.insert(name, object);
        Ok(201)
    }

    async fn update(
        &self,
        path: &ResourcePath,
        mutator: &(dyn Fn(Value) -> Result<Option<Value>> + Send + Sync),
    ) -> Result<UpdateOutcome> {
        self.update_calls.lock().await.push(path.to_string());

        let mut objects = self.objects.write().await;
        let Some(current) = objects
            .get_mut(&path.kind)
            .and_then(|by_name| by_name.get_mut(&path.name))
        else {
            return Err(StoreError::NotFound {
                path: path.to_string(),
            }
            .into());
        };

        let Some(updated) = mutator(current.clone())? else {
            return Ok(UpdateOutcome::Unchanged);
        };

        if let Some(status) = self.forced_rejection() {
            return Err(StoreError::api_error(status, "write rejected").into());
        }

        *current = updated;
        Ok(UpdateOutcome::Updated)
    }

    async fn delete(&self, path: &ResourcePath) -> Result<u16> {
        if let Some(status) = self.forced_rejection() {
            return Ok(status);
        }
        let removed = self
            .objects
            .write()
            .await
            .get_mut(&path.kind)
            .and_then(|by_name| by_name.remove(&path.name));
        Ok(if removed.is_some() { 200 } else { 404 })
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
