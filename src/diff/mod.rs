//! Snapshot comparison.
//!
//! This module compares two snapshots of keyed items and reports which
//! items were added, removed or modified between them.

mod engine;

pub use engine::{ChangeSet, DiffEngine, DiffKey, describe_keys};
