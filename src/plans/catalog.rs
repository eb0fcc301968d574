//! Plan catalog queries.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{PlanError, Result};
use crate::store::{ResourceKind, ResourceStore};

use super::types::{AddressPlan, AddressSpacePlan, AddressTypeSummary};

/// Read-only view of the plan resources.
#[derive(Debug)]
pub struct PlanCatalog<S: ResourceStore> {
    store: Arc<S>,
}

impl<S: ResourceStore> PlanCatalog<S> {
    /// Creates a catalog reading from `store`.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Fetches all address space plans.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    pub async fn address_space_plans(&self) -> Result<Vec<AddressSpacePlan>> {
        let objects = self.store.list(ResourceKind::AddressSpacePlan, None).await?;
        Ok(parse_all(objects, ResourceKind::AddressSpacePlan))
    }

    /// Fetches all address plans in store order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    pub async fn address_plans(&self) -> Result<Vec<AddressPlan>> {
        let objects = self.store.list(ResourceKind::AddressPlan, None).await?;
        Ok(parse_all(objects, ResourceKind::AddressPlan))
    }

    /// Lists the address types permitted by an address space plan, each
    /// with its plans in display order.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::NotFound`] if no address space plan has the
    /// given name, or a store error if the plans cannot be listed.
    pub async fn list_address_types(&self, address_space_plan: &str) -> Result<Vec<AddressTypeSummary>> {
        let space_plan = self
            .address_space_plans()
            .await?
            .into_iter()
            .find(|plan| plan.name() == address_space_plan)
            .ok_or_else(|| PlanError::NotFound {
                kind: String::from("Address space plan"),
                name: address_space_plan.to_string(),
            })?;

        let plans = self.address_plans().await?;
        let types = group_by_type(plans, &space_plan.address_plans);
        debug!(
            "Address space plan {address_space_plan} permits {} address types",
            types.len()
        );
        Ok(types)
    }
}

fn parse_all<T: serde::de::DeserializeOwned>(objects: Vec<Value>, kind: ResourceKind) -> Vec<T> {
    objects
        .into_iter()
        .filter_map(|object| match serde_json::from_value(object) {
            Ok(plan) => Some(plan),
            Err(e) => {
                warn!("Ignoring malformed {kind}: {e}");
                None
            }
        })
        .collect()
}

/// Keeps the plans named in `permitted`, orders them by display order and
/// groups them by address type.
///
/// Plans without a display order sort last and equal orders keep their
/// input order. Types appear in the order their first plan does.
#[must_use]
pub fn group_by_type(plans: Vec<AddressPlan>, permitted: &[String]) -> Vec<AddressTypeSummary> {
    let mut plans: Vec<AddressPlan> = plans
        .into_iter()
        .filter(|plan| permitted.iter().any(|p| p == plan.name()))
        .collect();
    plans.sort_by(|a, b| a.sort_key().total_cmp(&b.sort_key()));

    let mut types: Vec<AddressTypeSummary> = Vec::new();
    for plan in &plans {
        let summary = plan.summary();
        match types.iter_mut().find(|t| t.name == plan.address_type) {
            Some(entry) => entry.plans.push(summary),
            None => types.push(AddressTypeSummary {
                name: plan.address_type.clone(),
                plans: vec![summary],
            }),
        }
    }
    types
}
