//! Merge-style diff over sorted snapshots.
//!
//! Both snapshots are ordered by their key before comparison, so the result
//! does not depend on the order in which items were delivered.

use std::cmp::Ordering;
use tracing::trace;

/// Number of keys listed verbatim in a change description.
const DEFAULT_MAX_DESCRIBED: usize = 5;

/// An item with a stable identity used for ordering and matching.
pub trait DiffKey {
    /// Returns the identity key of this item.
    fn diff_key(&self) -> &str;
}

/// The result of comparing two snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet<T> {
    /// Items present only in the current snapshot.
    pub added: Vec<T>,
    /// Items present only in the previous snapshot.
    pub removed: Vec<T>,
    /// Items present in both but not equivalent (current version).
    pub modified: Vec<T>,
    /// Human readable summary of the changed keys.
    pub description: String,
}

/// Engine for computing change sets between snapshots.
#[derive(Debug, Clone, Copy)]
pub struct DiffEngine {
    /// Maximum number of keys spelled out in a description.
    max_described: usize,
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_described: DEFAULT_MAX_DESCRIBED,
        }
    }

    /// Sets how many keys a description lists before summarizing.
    #[must_use]
    pub const fn with_max_described(mut self, max_described: usize) -> Self {
        self.max_described = max_described;
        self
    }

    /// Returns a copy of `items` ordered by key.
    ///
    /// The sort is stable, so items sharing a key keep their relative order.
    #[must_use]
    pub fn sorted<T: DiffKey + Clone>(items: &[T]) -> Vec<T> {
        let mut sorted = items.to_vec();
        sorted.sort_by(|a, b| a.diff_key().cmp(b.diff_key()));
        sorted
    }

    /// Compares `previous` against `current`.
    ///
    /// Returns `None` when a previous snapshot exists and nothing changed.
    /// When there is no previous snapshot every current item is reported
    /// as added, even if `current` is empty.
    pub fn compute<T, F>(
        &self,
        previous: Option<&[T]>,
        current: &[T],
        equivalent: F,
    ) -> Option<ChangeSet<T>>
    where
        T: DiffKey + Clone,
        F: Fn(&T, &T) -> bool,
    {
        let mut before: Vec<&T> = previous.map(|p| p.iter().collect()).unwrap_or_default();
        before.sort_by(|a, b| a.diff_key().cmp(b.diff_key()));
        let mut after: Vec<&T> = current.iter().collect();
        after.sort_by(|a, b| a.diff_key().cmp(b.diff_key()));

        let mut added = Vec::new();
        let mut removed = Vec::new();
        let mut modified = Vec::new();

        let (mut i, mut j) = (0, 0);
        loop {
            match (before.get(i), after.get(j)) {
                (Some(old), Some(new)) => match old.diff_key().cmp(new.diff_key()) {
                    Ordering::Less => {
                        removed.push((*old).clone());
                        i += 1;
                    }
                    Ordering::Greater => {
                        added.push((*new).clone());
                        j += 1;
                    }
                    Ordering::Equal => {
                        if !equivalent(old, new) {
                            modified.push((*new).clone());
                        }
                        i += 1;
                        j += 1;
                    }
                },
                (Some(old), None) => {
                    removed.push((*old).clone());
                    i += 1;
                }
                (None, Some(new)) => {
                    added.push((*new).clone());
                    j += 1;
                }
                (None, None) => break,
            }
        }

        if previous.is_some() && added.is_empty() && removed.is_empty() && modified.is_empty() {
            trace!("No changes between snapshots");
            return None;
        }

        let keys: Vec<&str> = added
            .iter()
            .chain(&removed)
            .chain(&modified)
            .map(DiffKey::diff_key)
            .collect();
        let description = describe_keys(&keys, self.max_described);

        Some(ChangeSet {
            added,
            removed,
            modified,
            description,
        })
    }
}

impl<T> ChangeSet<T> {
    /// Returns the total number of changed items.
    #[must_use]
    pub fn total_changes(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }
}

/// Summarizes a list of keys.
///
/// Up to `max` keys are listed as a JSON array; longer lists show the first
/// `max` keys followed by "and N more".
#[must_use]
pub fn describe_keys(keys: &[&str], max: usize) -> String {
    if keys.len() > max {
        let shown = keys.iter().take(max).copied().collect::<Vec<_>>().join(", ");
        format!("{shown} and {} more", keys.len() - max)
    } else {
        serde_json::to_string(keys).unwrap_or_default()
    }
}
