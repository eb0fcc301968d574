//! Address definitions and their stored representation.
//!
//! This module covers everything about a single address: the raw
//! `ConfigMap` it is stored in, the parsed [`AddressDefinition`], the
//! collision-safe naming of its resource, and the create/delete adapter.

mod naming;
mod provisioner;
mod types;

pub use naming::{MAX_NAME_LENGTH, address_resource_name, namespaced_name, sanitize_name};
pub use provisioner::AddressProvisioner;
pub use types::{
    ADDRESS_API_VERSION, AddressDefinition, AddressResource, AddressSpec, AddressStatus,
    BROKER_ID_ANNOTATION, CONFIG_KEY, ConfigMap, ObjectMeta, Phase,
};
