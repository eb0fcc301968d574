//! Plan resource types.

use serde::{Deserialize, Serialize};

use crate::address::ObjectMeta;

/// A plan for a single address type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddressPlan {
    /// Plan metadata; the name identifies the plan.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Name shown to users.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// One-line description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    /// Full description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_description: Option<String>,
    /// Sort position; plans without one sort last.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_order: Option<f64>,
    /// Address type the plan applies to.
    pub address_type: String,
}

/// A plan for a whole address space.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddressSpacePlan {
    /// Plan metadata; the name identifies the plan.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Name shown to users.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// One-line description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    /// Sort position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_order: Option<f64>,
    /// Address space type the plan applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_space_type: Option<String>,
    /// Names of the address plans permitted in the address space.
    #[serde(default)]
    pub address_plans: Vec<String>,
}

/// Presentation of one address plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    /// Plan name.
    pub name: String,
    /// Name shown to users, defaulting to the plan name.
    pub display_name: String,
    /// One-line description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    /// Full description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_description: Option<String>,
}

/// An address type with its permitted plans in display order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressTypeSummary {
    /// Address type.
    pub name: String,
    /// Plans for the type.
    pub plans: Vec<PlanSummary>,
}

impl AddressPlan {
    /// Returns the plan name, or an empty string when unnamed.
    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// Returns the sort key; plans without an order sort last.
    #[must_use]
    pub fn sort_key(&self) -> f64 {
        self.display_order.unwrap_or(f64::INFINITY)
    }

    /// Returns the presentation of this plan.
    #[must_use]
    pub fn summary(&self) -> PlanSummary {
        let name = self.name().to_string();
        PlanSummary {
            display_name: self.display_name.clone().unwrap_or_else(|| name.clone()),
            name,
            short_description: self.short_description.clone(),
            long_description: self.long_description.clone(),
        }
    }
}

impl AddressSpacePlan {
    /// Returns the plan name, or an empty string when unnamed.
    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// Returns true if `plan` is permitted by this address space plan.
    #[must_use]
    pub fn permits(&self, plan: &str) -> bool {
        self.address_plans.iter().any(|p| p == plan)
    }
}
