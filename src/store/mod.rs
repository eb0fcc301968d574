//! Resource store access.
//!
//! This module defines the interface the agent uses to read and write the
//! resources it manages, together with an HTTP backend for a Kubernetes
//! style API server and an in-process backend.

mod api;
mod http;
mod memory;

pub use api::{ResourceKind, ResourcePath, ResourceStore, UpdateOutcome};
pub use http::HttpResourceStore;
pub use memory::{MemoryResourceStore, selector_matches};
