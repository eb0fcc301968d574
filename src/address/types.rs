//! Address data model.
//!
//! Addresses are stored one per `ConfigMap`, with the address document held
//! as a JSON string under the [`CONFIG_KEY`] data entry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::diff::DiffKey;
use crate::error::AddressError;

/// Data key holding the serialized address document.
pub const CONFIG_KEY: &str = "config.json";

/// Annotation naming the broker an address is allocated to.
pub const BROKER_ID_ANNOTATION: &str = "enmasse.io/broker-id";

/// API version written into new address documents.
pub const ADDRESS_API_VERSION: &str = "enmasse.io/v1alpha1";

/// Lifecycle phase of an address.
///
/// Phases reported by other components that the agent does not know are
/// kept verbatim in [`Phase::Other`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum Phase {
    /// Waiting for the address to be propagated.
    Pending,
    /// Being configured on the brokers.
    Configuring,
    /// Fully usable.
    Active,
    /// Configuration failed.
    Failed,
    /// Being removed.
    Terminating,
    /// Any other phase string.
    Other(String),
}

/// Status block of an address document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddressStatus {
    /// Whether the address has been fully propagated.
    #[serde(default)]
    pub is_ready: bool,
    /// Current phase, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    /// Free-form status message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Object metadata shared by stored resources and address documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Resource name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Namespace the resource lives in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Address space the resource belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_space: Option<String>,
    /// Labels used for watch selection.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Store-assigned unique id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Store-assigned version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    /// Store-assigned creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<String>,
}

/// The raw stored resource carrying one address document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMap {
    /// API version of the resource.
    #[serde(default = "default_config_map_api_version")]
    pub api_version: String,
    /// Kind of the resource.
    #[serde(default = "default_config_map_kind")]
    pub kind: String,
    /// Resource metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Data entries.
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

/// Desired state of an address as written by users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressSpec {
    /// The address itself.
    pub address: String,
    /// Address type (queue, topic, anycast, multicast, subscription).
    #[serde(rename = "type")]
    pub address_type: String,
    /// Plan name.
    #[serde(default)]
    pub plan: String,
    /// Topic for subscription addresses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

/// The address document stored under [`CONFIG_KEY`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddressResource {
    /// API version of the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    /// Kind of the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Document metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Desired state of the address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<AddressSpec>,
    /// Address status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AddressStatus>,
}

/// A parsed address as seen by the reconciler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressDefinition {
    /// The address, unique within its address space.
    pub address: String,
    /// Address type.
    #[serde(rename = "type")]
    pub address_type: String,
    /// Plan name.
    #[serde(default)]
    pub plan: String,
    /// Topic for subscription addresses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Broker the address is allocated to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocated_to: Option<String>,
    /// Name of the address document.
    #[serde(default)]
    pub name: String,
    /// Status, if any has been recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AddressStatus>,
}

fn default_config_map_api_version() -> String {
    String::from("v1")
}

fn default_config_map_kind() -> String {
    String::from("ConfigMap")
}

impl AddressDefinition {
    /// Creates a definition for a new address without status.
    #[must_use]
    pub fn new(address: impl Into<String>, address_type: impl Into<String>, plan: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            address_type: address_type.into(),
            plan: plan.into(),
            topic: None,
            allocated_to: None,
            name: String::new(),
            status: None,
        }
    }

    /// Sets the topic of a subscription address.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Sets the name of the address document.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Parses the address document held by a stored resource.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::Parse`] if the resource has no address
    /// document, the document is not valid JSON, or it lacks a spec.
    pub fn from_config_map(config_map: &ConfigMap) -> Result<Self, AddressError> {
        let resource_name = config_map.metadata.name.as_deref().unwrap_or("<unnamed>");

        let raw = config_map
            .data
            .get(CONFIG_KEY)
            .ok_or_else(|| AddressError::parse(resource_name, format!("no {CONFIG_KEY} entry")))?;

        let document: AddressResource = serde_json::from_str(raw)
            .map_err(|e| AddressError::parse(resource_name, format!("invalid {CONFIG_KEY}: {e}")))?;

        Self::from_resource(document)
            .ok_or_else(|| AddressError::parse(resource_name, "no spec found"))
    }

    /// Builds a definition from an address document.
    ///
    /// Returns `None` if the document has no spec.
    #[must_use]
    pub fn from_resource(resource: AddressResource) -> Option<Self> {
        let spec = resource.spec?;
        let allocated_to = resource
            .metadata
            .annotations
            .get(BROKER_ID_ANNOTATION)
            .cloned();
        let name = resource
            .metadata
            .name
            .unwrap_or_else(|| spec.address.clone());

        Some(Self {
            address: spec.address,
            address_type: spec.address_type,
            plan: spec.plan,
            topic: spec.topic,
            allocated_to,
            name,
            status: resource.status,
        })
    }

    /// Returns the spec portion of this definition.
    #[must_use]
    pub fn spec(&self) -> AddressSpec {
        AddressSpec {
            address: self.address.clone(),
            address_type: self.address_type.clone(),
            plan: self.plan.clone(),
            topic: self.topic.clone(),
        }
    }

    /// Compares identity, type and broker allocation.
    #[must_use]
    pub fn same_definition(&self, other: &Self) -> bool {
        self.address == other.address
            && self.address_type == other.address_type
            && self.allocated_to == other.allocated_to
    }

    /// Compares identity, type, broker allocation and status.
    #[must_use]
    pub fn same_definition_and_status(&self, other: &Self) -> bool {
        self.same_definition(other) && self.status == other.status
    }

    /// Returns true if the address may be advertised as usable.
    ///
    /// An address without status is not ready; one whose phase is
    /// `Terminating` or `Pending` is not ready either.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status.as_ref().is_some_and(|status| {
            !matches!(status.phase, Some(Phase::Terminating | Phase::Pending))
        })
    }
}

impl DiffKey for AddressDefinition {
    fn diff_key(&self) -> &str {
        &self.address
    }
}

impl Phase {
    /// Returns the phase as written in address documents.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "Pending",
            Self::Configuring => "Configuring",
            Self::Active => "Active",
            Self::Failed => "Failed",
            Self::Terminating => "Terminating",
            Self::Other(other) => other.as_str(),
        }
    }
}

impl From<String> for Phase {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Pending" => Self::Pending,
            "Configuring" => Self::Configuring,
            "Active" => Self::Active,
            "Failed" => Self::Failed,
            "Terminating" => Self::Terminating,
            _ => Self::Other(value),
        }
    }
}

impl From<Phase> for String {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_map(name: &str, document: &str) -> ConfigMap {
        let mut data = BTreeMap::new();
        data.insert(CONFIG_KEY.to_string(), document.to_string());
        ConfigMap {
            api_version: String::from("v1"),
            kind: String::from("ConfigMap"),
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..ObjectMeta::default()
            },
            data,
        }
    }

    #[test]
    fn test_parse_full_document() {
        let cm = config_map(
            "space.q1",
            r#"{
                "apiVersion": "enmasse.io/v1alpha1",
                "kind": "Address",
                "metadata": {
                    "name": "space.q1",
                    "annotations": {"enmasse.io/broker-id": "broker-0"}
                },
                "spec": {"address": "q1", "type": "queue", "plan": "small-queue"},
                "status": {"isReady": false, "phase": "Configuring", "message": "waiting"}
            }"#,
        );

        let def = AddressDefinition::from_config_map(&cm).expect("document should parse");

        assert_eq!(def.address, "q1");
        assert_eq!(def.address_type, "queue");
        assert_eq!(def.plan, "small-queue");
        assert_eq!(def.name, "space.q1");
        assert_eq!(def.allocated_to.as_deref(), Some("broker-0"));
        let status = def.status.expect("status present");
        assert_eq!(status.phase, Some(Phase::Configuring));
        assert_eq!(status.message.as_deref(), Some("waiting"));
    }

    #[test]
    fn test_name_falls_back_to_address() {
        let cm = config_map("cm", r#"{"spec": {"address": "t1", "type": "topic"}}"#);
        let def = AddressDefinition::from_config_map(&cm).expect("document should parse");
        assert_eq!(def.name, "t1");
        assert!(def.status.is_none());
    }

    #[test]
    fn test_missing_spec_is_parse_error() {
        let cm = config_map("cm", r#"{"metadata": {"name": "x"}}"#);
        let err = AddressDefinition::from_config_map(&cm).expect_err("spec is required");
        assert!(matches!(err, AddressError::Parse { ref resource, .. } if resource == "cm"));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let cm = config_map("cm", "{not json");
        assert!(AddressDefinition::from_config_map(&cm).is_err());
    }

    #[test]
    fn test_missing_config_entry_is_parse_error() {
        let cm = ConfigMap {
            api_version: String::from("v1"),
            kind: String::from("ConfigMap"),
            metadata: ObjectMeta::default(),
            data: BTreeMap::new(),
        };
        assert!(AddressDefinition::from_config_map(&cm).is_err());
    }

    #[test]
    fn test_readiness_filter() {
        let mut def = AddressDefinition::new("q1", "queue", "small");
        assert!(!def.is_ready());

        def.status = Some(AddressStatus::default());
        assert!(def.is_ready());

        for (phase, expected) in [
            (Phase::Active, true),
            (Phase::Configuring, true),
            (Phase::Failed, true),
            (Phase::Pending, false),
            (Phase::Terminating, false),
        ] {
            def.status = Some(AddressStatus {
                is_ready: false,
                phase: Some(phase.clone()),
                message: None,
            });
            assert_eq!(def.is_ready(), expected, "phase {phase}");
        }
    }

    #[test]
    fn test_unrecognized_phase_is_kept() {
        let cm = config_map(
            "cm",
            r#"{"spec": {"address": "q1", "type": "queue"}, "status": {"phase": "Migrating"}}"#,
        );
        let def = AddressDefinition::from_config_map(&cm).expect("document should parse");

        let status = def.status.as_ref().expect("status present");
        assert_eq!(status.phase, Some(Phase::Other(String::from("Migrating"))));
        assert!(def.is_ready());

        let serialized = serde_json::to_value(status).expect("serialize");
        assert_eq!(serialized["phase"], "Migrating");
        assert_eq!(Phase::from(String::from("Active")), Phase::Active);
    }

    #[test]
    fn test_equivalence() {
        let a = AddressDefinition::new("q1", "queue", "small");
        let mut b = a.clone().with_name("other-name");
        b.plan = String::from("large");
        assert!(a.same_definition_and_status(&b));

        b.status = Some(AddressStatus::default());
        assert!(a.same_definition(&b));
        assert!(!a.same_definition_and_status(&b));

        b.allocated_to = Some(String::from("broker-1"));
        assert!(!a.same_definition(&b));
    }
}
