//! Address plan catalog.
//!
//! This module reads the plan resources of the platform and presents the
//! address types and plans permitted by an address space plan.

mod catalog;
mod types;

pub use catalog::{PlanCatalog, group_by_type};
pub use types::{AddressPlan, AddressSpacePlan, AddressTypeSummary, PlanSummary};
