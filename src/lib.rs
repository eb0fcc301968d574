// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Address Agent
//!
//! A controller that watches the address resources of a messaging address
//! space and keeps their readiness in step with the brokers.
//!
//! ## Overview
//!
//! Addresses are stored one per `ConfigMap` in a Kubernetes style API
//! server. The agent:
//!
//! - Lists the address resources on every resync and diffs each listing
//!   against the previous one
//! - Notifies subscribers when the defined or ready address sets change
//! - Tracks per-address readiness from broker propagation stats and writes
//!   every change back to the stored address document
//! - Creates and deletes addresses, and lists the address plans permitted by
//!   the address space plan
//!
//! ## Architecture
//!
//! Data flows one way: resource watcher → controller → reconciler → diff
//! engine → readiness ledger and notifications. The controller owns the
//! reconciler in a single task, so batches and readiness checks never
//! interleave.
//!
//! ## Modules
//!
//! - [`address`]: Address model, resource naming and create/delete
//! - [`diff`]: Snapshot comparison
//! - [`readiness`]: Readiness ledger and status write-back
//! - [`reconciler`]: Watch batch processing and notifications
//! - [`controller`]: Serialized controller task and resource watcher
//! - [`plans`]: Address plan catalog
//! - [`store`]: Resource store backends (HTTP, in-memory)
//! - [`agent`]: The agent facade
//! - [`config`]: Configuration parsing and validation
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! address_space: myspace
//! address_space_plan: standard-small
//! infra_uuid: 5c1b4a2e
//! store:
//!   url: https://kubernetes.default.svc
//!   namespace: messaging
//!   token_file: /var/run/secrets/kubernetes.io/serviceaccount/token
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod address;
pub mod agent;
pub mod cli;
pub mod config;
pub mod controller;
pub mod diff;
pub mod error;
pub mod plans;
pub mod readiness;
pub mod reconciler;
pub mod store;

// ============================================================================
// Re-exports
// ============================================================================

pub use address::{AddressDefinition, AddressProvisioner, ConfigMap};
pub use agent::AddressAgent;
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{AgentConfig, ConfigParser, ConfigValidator};
pub use controller::{ControllerHandle, ResourceWatcher};
pub use diff::{ChangeSet, DiffEngine};
pub use error::{AgentError, Result};
pub use plans::{AddressTypeSummary, PlanCatalog};
pub use readiness::{PropagationStats, ReadinessLedger, StatsMap};
pub use reconciler::{AddressReconciler, Notification};
pub use store::{HttpResourceStore, MemoryResourceStore, ResourceStore};
